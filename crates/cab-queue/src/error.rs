//! # Queue Errors
//!
//! [`JobFailure`] is the tagged union recorded on failed jobs. Its
//! `Display` form is what pollers see in the job's `error` field, so the
//! tag prefixes (`runner_failed`, `validation_failed`, `publish_failed`)
//! are part of the wire contract.

use std::path::PathBuf;

use cab_store::{StoreError, ValidationError};
use thiserror::Error;

/// The runner could not produce an artifact.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The runner reported a failure of its own.
    #[error("{0}")]
    Failed(String),

    /// The runner program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The runner program exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    /// The runner's output was not the expected `{artifact, manifest}`.
    #[error("malformed runner output: {0}")]
    MalformedOutput(String),

    /// IO while talking to the runner.
    #[error("runner io error: {0}")]
    Io(#[from] std::io::Error),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),
}

/// Why a job ended in `error`.
#[derive(Error, Debug)]
pub enum JobFailure {
    #[error("runner_failed: {0}")]
    Runner(#[from] RunnerError),

    #[error("validation_failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("publish_failed: {0}")]
    Publish(#[from] StoreError),
}

impl JobFailure {
    /// Short tag identifying the failed stage.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Runner(_) => "runner_failed",
            Self::Validation(_) => "validation_failed",
            Self::Publish(_) => "publish_failed",
        }
    }
}

/// Submission rejected before a job was created.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The job targets a different store than the one this queue publishes to.
    #[error(
        "job out_root {} does not match queue store root {}",
        .got.display(),
        .expected.display()
    )]
    OutRootMismatch { expected: PathBuf, got: PathBuf },

    /// A worker thread could not be started.
    #[error("failed to spawn queue worker: {0}")]
    Spawn(#[source] std::io::Error),
}
