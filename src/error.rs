//! Error types for the preprocessing pipeline

use crate::reader::Columns;
use std::io;
use std::path::PathBuf;

/// Everything that can stop a preprocessing run. None of these are recovered
/// from locally: the pipeline either produces a full output set or nothing.
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("{vocab} vocabulary must be empty before this stage runs")]
    VocabularyNotEmpty { vocab: &'static str },

    #[error("item vocabulary is empty; run the item-entity linker first")]
    EmptyItemVocabulary,

    #[error("{}:{line}: expected {expected} columns, found {found}", path.display())]
    ColumnCount {
        path: PathBuf,
        line: usize,
        expected: Columns,
        found: usize,
    },

    #[error("{}:{line}: column {column} value {value:?}: {reason}", path.display())]
    InvalidField {
        path: PathBuf,
        line: usize,
        column: usize,
        value: String,
        reason: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PrepError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn encode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
