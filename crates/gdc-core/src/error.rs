//! Unified error types for the gdc crates
//!
//! This module provides a common error type [`GridError`] that can represent
//! errors from any part of the dispatch engine. Domain-specific failures are
//! converted to `GridError` at API boundaries so that callers can handle
//! configuration, data and solver problems uniformly.

use thiserror::Error;

/// Unified error type for all gdc operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors (file access etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Run configuration errors (incompatible year lists, invariant
    /// violations in entity parameters, missing required columns)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data errors (region absent from a dataset, out-of-range capacity
    /// factor series)
    #[error("Data error: {0}")]
    Data(String),

    /// The LP backend finished with a non-optimal status
    #[error("Solver finished with non-optimal status: {0}")]
    Infeasible(String),

    /// Unexpected numeric condition in post-solve processing
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using GridError.
pub type GridResult<T> = Result<T, GridError>;

impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        GridError::Other(err.to_string())
    }
}

impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridError::Infeasible("Unbounded".into());
        assert!(err.to_string().contains("non-optimal status"));
        assert!(err.to_string().contains("Unbounded"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let grid_err: GridError = io_err.into();
        assert!(matches!(grid_err, GridError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> GridResult<()> {
            Err(GridError::Config("bad ramp rate".into()))
        }

        fn outer() -> GridResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
