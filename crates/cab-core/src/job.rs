//! # Job Lifecycle
//!
//! A job is one request to compute (or recompute) the artifact for a track.
//!
//! ```text
//! Pending ──start──▶ Running ──complete──▶ Done
//!                       │
//!                       └────fail────────▶ Error
//! ```
//!
//! `Done` and `Error` are terminal. There is no retry: a failed job stays
//! failed and the client submits a new one.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::digest::ContentDigest;
use crate::identity::{ConfigHash, JobId, TrackId};

// ── Job Status ───────────────────────────────────────────────────────

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted and queued, not yet picked up by a worker.
    Pending,
    /// A worker is executing the runner or validating its output.
    Running,
    /// Artifact validated and index entry published. Terminal.
    Done,
    /// Runner, validation or publication failed. Terminal.
    Error,
}

impl JobStatus {
    /// Whether this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// The wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Error Types ──────────────────────────────────────────────────────

/// Rejected lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job already reached `done` or `error`.
    #[error("job {id} is already in terminal state {status}")]
    AlreadyTerminal { id: JobId, status: JobStatus },

    /// The transition is not an edge of the lifecycle graph.
    #[error("job {id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

// ── Inputs and Result ────────────────────────────────────────────────

/// Everything the runner needs to compute an artifact.
///
/// `probe_kwargs` and `runner_kwargs` are opaque to the broker and handed to
/// the runner untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInputs {
    pub features_path: PathBuf,
    pub out_root: PathBuf,
    pub track_id: TrackId,
    #[serde(default)]
    pub run_id: Option<String>,
    pub config_hash: ConfigHash,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub db_hash: Option<String>,
    #[serde(default)]
    pub probe_kwargs: Map<String, Value>,
    #[serde(default)]
    pub runner_kwargs: Map<String, Value>,
}

impl JobInputs {
    /// Inputs with only the required fields set.
    pub fn new(
        features_path: impl Into<PathBuf>,
        out_root: impl Into<PathBuf>,
        track_id: TrackId,
        config_hash: ConfigHash,
    ) -> Self {
        Self {
            features_path: features_path.into(),
            out_root: out_root.into(),
            track_id,
            run_id: None,
            config_hash,
            db_path: None,
            db_hash: None,
            probe_kwargs: Map::new(),
            runner_kwargs: Map::new(),
        }
    }
}

/// Outcome of a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub artifact_path: PathBuf,
    pub manifest_path: PathBuf,
    pub etag: ContentDigest,
}

// ── Job ──────────────────────────────────────────────────────────────

/// A job and its lifecycle state.
///
/// Only the worker that owns a job mutates it; everyone else reads a
/// [`JobSnapshot`].
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    inputs: JobInputs,
    status: JobStatus,
    result: Option<JobResult>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job with a fresh id.
    pub fn new(inputs: JobInputs) -> Self {
        Self::with_id(JobId::new(), inputs)
    }

    /// Create a pending job with a caller-chosen id.
    pub fn with_id(id: JobId, inputs: JobInputs) -> Self {
        Self {
            id,
            inputs,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn inputs(&self) -> &JobInputs {
        &self.inputs
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `pending → running`.
    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `running → done`, recording the validated result.
    pub fn complete(&mut self, result: JobResult) -> Result<(), JobError> {
        self.transition(JobStatus::Done)?;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `pending | running → error`, recording a human-readable reason.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Error)?;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            });
        }
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Error)
                | (JobStatus::Running, JobStatus::Done)
                | (JobStatus::Running, JobStatus::Error)
        );
        if !allowed {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Immutable copy of the externally visible state.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            status: self.status,
            track_id: self.inputs.track_id.clone(),
            config_hash: self.inputs.config_hash.clone(),
            run_id: self.inputs.run_id.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Point-in-time view of a job, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub track_id: TrackId,
    pub config_hash: ConfigHash,
    pub run_id: Option<String>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
