//! Crate-wide error taxonomy.
//!
//! `Unsat` is an expected outcome of a negation attempt and is the only
//! recoverable variant inside the search loop; everything else bubbles out
//! to the CLI as a fatal diagnostic.

use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to load program: {0}")]
    Load(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed module file: {0}")]
    Module(#[from] serde_json::Error),

    #[error("illegal use of the symbol carrier: {0}")]
    SymbolShape(String),

    #[error("interpreter failure: {0}")]
    Interp(String),

    #[error("failed to encode trace: {0}")]
    Encode(String),

    #[error("unsat")]
    Unsat,

    #[error("solver failure: {0}")]
    Solver(String),
}
