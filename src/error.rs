use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a storage tier (local JSON files or the remote API).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection refused, timeout, or a 5xx answer. The tiered store falls back on this.
    #[error("Remote backend unavailable: {0}")]
    Unavailable(String),

    #[error("Remote backend returned status {status}: {message}")]
    Http { status: u16, message: String },

    /// A key that cannot be sent as a single URL path segment.
    #[error("Invalid key for a remote path: {0:?}")]
    InvalidKey(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure says nothing about the request itself, only about reachability.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum GradebookError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Component percentages do not add up to 100 and the strict policy is active.
    #[error("Inconsistent rubric: {0}")]
    InconsistentRubric(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GradebookError {
    pub fn validation(message: impl Into<String>) -> Self {
        GradebookError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        GradebookError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GradebookError>;
