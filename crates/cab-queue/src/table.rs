//! # Job Table
//!
//! In-memory record of every job the queue has accepted. Callers only ever
//! see [`JobSnapshot`] copies; mutation goes through the lifecycle methods
//! on [`Job`], each under a single write lock.
//!
//! The lock is `parking_lot`, so a panic elsewhere never poisons the table,
//! and it is never held while a runner executes.

use std::collections::HashMap;
use std::sync::Arc;

use cab_core::{Job, JobError, JobId, JobInputs, JobResult, JobSnapshot, JobStatus};
use parking_lot::RwLock;

/// Count of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.done + self.error
    }
}

/// Shared, thread-safe job table.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job and return its snapshot.
    pub fn insert(&self, job: Job) -> JobSnapshot {
        let snapshot = job.snapshot();
        self.jobs.write().insert(job.id(), job);
        snapshot
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.jobs.read().get(id).map(Job::snapshot)
    }

    /// Move a job to `running` and hand back its inputs.
    ///
    /// `None` if the job is unknown; `Some(Err)` if it was not pending.
    pub fn start(&self, id: &JobId) -> Option<Result<JobInputs, JobError>> {
        self.jobs
            .write()
            .get_mut(id)
            .map(|job| job.start().map(|()| job.inputs().clone()))
    }

    /// Record a successful outcome.
    pub fn complete(&self, id: &JobId, result: JobResult) -> Option<Result<(), JobError>> {
        self.jobs.write().get_mut(id).map(|job| job.complete(result))
    }

    /// Record a failure.
    pub fn fail(&self, id: &JobId, error: String) -> Option<Result<(), JobError>> {
        self.jobs.write().get_mut(id).map(|job| job.fail(error))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Count jobs per status.
    pub fn counts(&self) -> StatusCounts {
        let jobs = self.jobs.read();
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}
