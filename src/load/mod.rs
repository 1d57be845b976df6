//! Program loading facade.
//!
//! Ties together the module container, driver synthesis, symbol discovery
//! and per-function option resolution. Each requested function moves through
//! Loaded → Synthesized → Canonicalized → Ready exactly once; a failure
//! drops that function with a diagnostic but leaves the others alive.

use std::path::Path;

use crate::engine::ExecuteOpts;
use crate::error::{Error, Result};
use crate::ssa::{FuncId, Module, ValueId};

pub(crate) mod driver;
pub(crate) mod symbols;

pub(crate) const DEFAULT_MAX_EXEC: u32 = 10;
pub(crate) const DEFAULT_MIN_COVERAGE: f64 = 1.0;

/// Annotation directive prefix on function declarations.
const DIRECTIVE_PREFIX: &str = "congen:";

#[derive(Debug, Clone, Default)]
pub(crate) struct Config {
    /// Requested function names; empty means every annotated function.
    pub funcs: Vec<String>,
    /// Explicit CLI override; 0 leaves annotations and defaults in charge.
    pub max_exec: u32,
    /// Explicit CLI override; 0.0 leaves annotations and defaults in charge.
    pub min_coverage: f64,
    /// Adopt this function as the driver instead of synthesizing one.
    pub runner: Option<String>,
}

/// One function prepared for the search engine.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub name: String,
    pub func: FuncId,
    pub driver: FuncId,
    /// Ordered symbol values; defines the input-vector layout.
    pub symbols: Vec<ValueId>,
    /// Ordered oracle values, when the driver asserts on results.
    pub retvals: Vec<ValueId>,
    pub opts: ExecuteOpts,
}

pub(crate) struct Program {
    pub module: Module,
    pub targets: Vec<Target>,
}

pub(crate) fn load_file(path: &Path, config: &Config) -> Result<Program> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::Load(format!("{}: {err}", path.display())))?;
    let module: Module = serde_json::from_str(&text)?;
    load_module(module, config)
}

pub(crate) fn load_module(mut module: Module, config: &Config) -> Result<Program> {
    let names: Vec<String> = if config.funcs.is_empty() {
        module
            .funcs
            .iter()
            .filter(|f| {
                f.annotations
                    .iter()
                    .any(|a| a.trim_start().starts_with(DIRECTIVE_PREFIX))
            })
            .map(|f| f.name.clone())
            .collect()
    } else {
        config.funcs.clone()
    };
    if names.is_empty() {
        return Err(Error::Config(
            "no target functions: pass -f or annotate functions with congen: directives".into(),
        ));
    }

    let mut targets = Vec::new();
    for name in names {
        match load_target(&mut module, config, &name) {
            Ok(target) => targets.push(target),
            Err(err) => tracing::error!(%name, %err, "skipping target function"),
        }
    }
    if targets.is_empty() {
        return Err(Error::Load("no target function could be prepared".into()));
    }
    Ok(Program { module, targets })
}

fn load_target(module: &mut Module, config: &Config, name: &str) -> Result<Target> {
    let func = module
        .func_by_name(name)
        .ok_or_else(|| Error::Config(format!("function {name} does not exist in the module")))?;

    let driver = match &config.runner {
        Some(runner) => module.func_by_name(runner).ok_or_else(|| {
            Error::Config(format!("runner function {runner} does not exist in the module"))
        })?,
        None => driver::synthesize(module, func)?,
    };

    let set = symbols::discover(module, driver)?;

    let (anno_max, anno_cov) = parse_directives(&module.func(func).annotations)?;
    let max_exec = if config.max_exec > 0 {
        config.max_exec
    } else {
        anno_max.unwrap_or(DEFAULT_MAX_EXEC)
    };
    let min_coverage = if config.min_coverage > 0.0 {
        config.min_coverage
    } else {
        anno_cov.unwrap_or(DEFAULT_MIN_COVERAGE)
    };

    Ok(Target {
        name: name.to_owned(),
        func,
        driver,
        symbols: set.symbols,
        retvals: set.retvals,
        opts: ExecuteOpts {
            max_exec,
            min_coverage,
        },
    })
}

/// Parses `congen:maxexec <uint>` and `congen:cover <float>` directive
/// lines. Unknown directives and malformed values are configuration errors.
fn parse_directives(annotations: &[String]) -> Result<(Option<u32>, Option<f64>)> {
    let mut max_exec = None;
    let mut cover = None;
    for line in annotations {
        let Some(rest) = line.trim().strip_prefix(DIRECTIVE_PREFIX) else {
            continue;
        };
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("maxexec"), Some(v)) => {
                let n: u32 = v
                    .parse()
                    .map_err(|_| Error::Config(format!("bad congen:maxexec value {v:?}")))?;
                if n == 0 {
                    return Err(Error::Config("congen:maxexec must be at least 1".into()));
                }
                max_exec = Some(n);
            }
            (Some("cover"), Some(v)) => {
                let c: f64 = v
                    .parse()
                    .map_err(|_| Error::Config(format!("bad congen:cover value {v:?}")))?;
                if !(0.0..=1.0).contains(&c) {
                    return Err(Error::Config(format!(
                        "congen:cover value {c} is outside [0, 1]"
                    )));
                }
                cover = Some(c);
            }
            (Some(directive), _) => {
                return Err(Error::Config(format!(
                    "unknown directive congen:{directive}"
                )))
            }
            (None, _) => return Err(Error::Config("empty congen: directive".into())),
        }
    }
    Ok((max_exec, cover))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_override_defaults_but_not_cli() {
        let annos = vec!["congen:maxexec 4".to_owned(), "congen:cover 0.5".to_owned()];
        let (max_exec, cover) = parse_directives(&annos).unwrap();
        assert_eq!(max_exec, Some(4));
        assert_eq!(cover, Some(0.5));

        assert!(parse_directives(&["congen:maxexec zero".to_owned()]).is_err());
        assert!(parse_directives(&["congen:cover 1.5".to_owned()]).is_err());
        assert!(parse_directives(&["congen:frobnicate 1".to_owned()]).is_err());
        // Non-directive lines are plain documentation.
        assert_eq!(
            parse_directives(&["reverses its input".to_owned()]).unwrap(),
            (None, None)
        );
    }
}
