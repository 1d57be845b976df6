use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{Error, Result};
use crate::load::{self, Config};
use crate::ssa::Module;
use crate::value::Sizing;
use crate::{engine, testgen};

#[derive(Parser)]
#[clap(
    name = "congen",
    version,
    about = "Generates unit test inputs for SSA modules via concolic execution"
)]
pub(crate) struct Opts {
    /// Module file of the target program.
    pub package: PathBuf,
    /// Target function name; repeatable. Defaults to every annotated
    /// function in the module.
    #[clap(short = 'f', long = "func")]
    pub funcs: Vec<String>,
    /// Write the generated test module here instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub out: Option<PathBuf>,
    /// Minimum basic-block coverage to reach, in [0, 1].
    #[clap(long)]
    pub coverage: Option<f64>,
    /// Maximum number of concolic iterations per function.
    #[clap(long)]
    pub maxexec: Option<u32>,
    /// Use this pre-existing function as the driver instead of
    /// synthesizing one.
    #[clap(short = 'r', long = "runner")]
    pub runner: Option<String>,
    /// Dump driver and target SSA and exit.
    #[clap(long)]
    pub ssa: bool,
    /// Dump the loaded module container and exit.
    #[clap(long)]
    pub ast: bool,
    #[clap(long, value_enum, default_value = "info")]
    pub log: LogLevel,
    /// Accepted for flag compatibility; profiling is not wired up.
    #[clap(long)]
    pub cpuprofile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogLevel {
    Debug,
    Info,
    Error,
    Disabled,
}

pub(crate) fn main() {
    let opts = Opts::parse();
    init_logging(opts.log);
    if let Err(err) = run(&opts) {
        eprintln!("congen: {err}");
        std::process::exit(1);
    }
}

fn init_logging(level: LogLevel) {
    let filter = match level {
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Disabled => LevelFilter::OFF,
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(opts: &Opts) -> Result<()> {
    if let Some(coverage) = opts.coverage {
        if !(0.0..=1.0).contains(&coverage) {
            return Err(Error::Config(format!(
                "coverage {coverage} is outside [0, 1]"
            )));
        }
    }
    if opts.maxexec == Some(0) {
        return Err(Error::Config("maxexec must be at least 1".into()));
    }
    if opts.cpuprofile.is_some() {
        info!("cpu profiling is not supported in this build");
    }

    if opts.ast {
        let text = std::fs::read_to_string(&opts.package)?;
        let module: Module = serde_json::from_str(&text)?;
        println!("{}", serde_json::to_string_pretty(&module)?);
        return Ok(());
    }

    let config = Config {
        funcs: opts.funcs.clone(),
        max_exec: opts.maxexec.unwrap_or(0),
        min_coverage: opts.coverage.unwrap_or(0.0),
        runner: opts.runner.clone(),
    };
    let program = load::load_file(&opts.package, &config)?;

    if opts.ssa {
        for target in &program.targets {
            print!("{}", program.module.display_func(target.driver));
            print!("{}", program.module.display_func(target.func));
        }
        return Ok(());
    }

    let sizing = Sizing::default();
    let mut rendered = String::new();
    for target in &program.targets {
        let result = engine::execute(&program.module, target, &target.opts, sizing)?;
        info!(
            target = %target.name,
            coverage = result.coverage,
            cases = result.cases.len(),
            "search finished"
        );
        rendered.push_str(&testgen::render(&program.module, target, &result));
    }

    match &opts.out {
        Some(path) => std::fs::write(path, rendered)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
        }
    }
    Ok(())
}
