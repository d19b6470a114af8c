use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{UnknownField, ValidationError};

/// Failure surfaced by any directory operation. Repository calls never swallow
/// errors into booleans or sentinels; the caller decides how to present them.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid filter choice: {0}")]
    InvalidFilter(String),
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("database session is closed")]
    SessionClosed,
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid settings: {0}")]
    Config(String),
    #[error("{0} is required.")]
    IncompleteNotice(&'static str),
}

impl DirectoryError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DirectoryError::File {
            path: path.into(),
            source,
        }
    }
}

impl From<UnknownField> for DirectoryError {
    fn from(value: UnknownField) -> Self {
        DirectoryError::InvalidFilter(value.0)
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
