//! # Store Errors

use std::path::PathBuf;

use cab_core::IdentifierError;
use thiserror::Error;

/// Failures writing to or reading from the artifact tree.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fingerprint already holds different bytes under this name.
    #[error("{} already holds different content", path.display())]
    FingerprintConflict { path: PathBuf },

    /// A file name or identifier is not a single safe path segment.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Identifier rejected.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// A stored JSON document could not be encoded or decoded.
    #[error("serialization error at {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
