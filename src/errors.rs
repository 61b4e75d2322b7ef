//! Shared error types for weaving operations.

use crate::core::SourceLocation;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for spanweave operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Source parsing errors
    #[error("Parse error in {file}:{line}:{column}: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Call-target or predicate resolution errors
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Redirection registry errors
    #[error("Redirection error at {location}: {message}")]
    Redirection {
        location: SourceLocation,
        message: String,
    },
}

impl Error {
    /// Build a parse error from a `syn` error against a known file.
    pub fn from_syn(file: impl Into<PathBuf>, err: &syn::Error) -> Self {
        let start = err.span().start();
        Self::Parse {
            file: file.into(),
            line: start.line,
            column: start.column,
            message: err.to_string(),
        }
    }
}

/// Result type alias using the spanweave error.
pub type Result<T> = std::result::Result<T, Error>;
