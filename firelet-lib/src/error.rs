use thiserror::Error;

use crate::compiler;
use crate::dump;
use crate::executor;
use crate::store;

/// Crate-wide error composing the per-component errors at the orchestrator boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("compile error: {0}")]
    Compile(#[from] compiler::Error),
    #[error("parse error: {0}")]
    Parse(#[from] dump::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error("one or more hosts did not return a result: {0:?}")]
    FetchIncomplete(Vec<String>),
    #[error("executor error: {0}")]
    Executor(#[from] executor::Error),
}
