//! Public error types.
//!
//! Internal errors are converted to these at the API boundary: compilation
//! failures keep their [`CompileError`], program exceptions keep the very
//! `Arc<Exception>` that was thrown so callers can compare identity.

use thiserror::Error;

use crate::compiler::CompileError;
use crate::values::ExceptionRef;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid API usage (e.g., wrong number of arguments).
    #[error("{0}")]
    Api(String),

    /// The expression tree could not be compiled.
    #[error(transparent)]
    Compilation(#[from] CompileError),

    /// An exception escaped the lambda.
    #[error("{0}")]
    Runtime(ExceptionRef),
}

impl Error {
    /// The escaped exception, for runtime errors.
    pub fn exception(&self) -> Option<&ExceptionRef> {
        match self {
            Error::Runtime(exception) => Some(exception),
            _ => None,
        }
    }
}

impl From<ExceptionRef> for Error {
    fn from(exception: ExceptionRef) -> Self {
        Error::Runtime(exception)
    }
}
