//! Error types for the data-loader crate.

use thiserror::Error;

/// Errors that can occur while loading the dataset.
///
/// Every variant is fatal for a load: the loader never hands back a
/// partially built table. Use [`DataLoadError::kind`] to tell an unreadable
/// source apart from malformed content.
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// The file could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Line in a data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Expected number of fields in a line doesn't match actual
    #[error("Expected {expected} fields but found {found} in {file} line {line}")]
    FieldCountMismatch {
        file: String,
        expected: usize,
        found: usize,
        line: usize,
    },

    /// Referenced entity doesn't exist (e.g. rating for an id above the declared count)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// Data validation failed
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Coarse classification of a [`DataLoadError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source could not be read at all
    Fetch,
    /// The source was read but its content is malformed
    Parse,
    /// Content parsed but is inconsistent (dangling ids, counts)
    Integrity,
}

impl DataLoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataLoadError::Fetch { .. } => ErrorKind::Fetch,
            DataLoadError::Parse { .. }
            | DataLoadError::InvalidValue { .. }
            | DataLoadError::FieldCountMismatch { .. } => ErrorKind::Parse,
            DataLoadError::MissingReference { .. } | DataLoadError::Validation(_) => {
                ErrorKind::Integrity
            }
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
