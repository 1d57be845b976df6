//! Concolic test input generation over an SSA intermediate form.
//!
//! Given a module and a target function, `congen` repeatedly interprets the
//! function on concrete inputs, records the branch decisions taken, encodes
//! the path condition into an SMT theory, and asks the solver for inputs
//! that flip unexplored branches until a basic-block coverage goal is met.
//! The discovered input/output pairs are emitted as a test module.

mod cli;
mod engine;
mod error;
mod interp;
mod load;
mod solver;
mod ssa;
mod testgen;
mod value;

pub(crate) use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};


fn main() {
    cli::main();
}
