//! # Storage Error Types

use thiserror::Error;

/// Errors from a storage gateway.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The object key is not a safe relative path.
    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No object is stored under the key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Filesystem failure.
    #[error("storage I/O error for {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The metadata sidecar could not be written or read.
    #[error("object metadata for {key}: {source}")]
    Metadata {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(key.to_string())
        } else {
            Self::Io {
                key: key.to_string(),
                source,
            }
        }
    }
}
