//! # Error Types
//!
//! Errors raised by `cab-core` constructors. Job lifecycle errors live
//! next to the state machine in [`crate::job`].

use thiserror::Error;

/// A value failed its constructor's validation rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Track identifier is empty, too long, or could escape the index directory.
    #[error("invalid track_id {0:?}: {1}")]
    InvalidTrackId(String, &'static str),

    /// Fingerprint segment is empty, reserved, or not a single path segment.
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidFingerprint {
        /// Which half of the fingerprint (`config_hash` or `source_hash`).
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Job identifier is not a UUID.
    #[error("invalid job_id {0:?}")]
    InvalidJobId(String),

    /// Hex digest is malformed.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}
