//! # Job Queue
//!
//! FIFO queue drained by a fixed pool of worker threads.
//!
//! `submit()` records the job as `pending`, pushes its id and wakes one
//! worker; it never waits on a runner. Workers pop ids in submission order,
//! but completion order across workers is not guaranteed.
//!
//! ## Shutdown
//!
//! The pool lives as long as any `JobQueue` handle. When the last handle is
//! dropped the workers finish the job they are on and exit; jobs still
//! queued stay `pending`.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cab_core::{Job, JobId, JobInputs, JobResult, JobSnapshot};
use cab_store::{IndexPublisher, StoreLayout, Validator};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{JobFailure, QueueError, RunnerError};
use crate::runner::{RunRequest, Runner};
use crate::table::{JobTable, StatusCounts};

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub workers: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub jobs: StatusCounts,
}

struct QueueState {
    fifo: VecDeque<JobId>,
    in_flight: usize,
    shutdown: bool,
}

impl QueueState {
    fn is_settled(&self) -> bool {
        self.fifo.is_empty() && self.in_flight == 0
    }
}

struct Shared {
    runner: Arc<dyn Runner>,
    validator: Validator,
    publisher: IndexPublisher,
    table: JobTable,
    state: Mutex<QueueState>,
    /// Signalled when an id is queued or on shutdown.
    work_ready: Condvar,
    /// Signalled when the queue becomes empty with nothing in flight.
    settled: Condvar,
    workers: usize,
}

/// Owns the worker threads; dropped with the last `JobQueue` handle.
struct Pool {
    shared: Arc<Shared>,
    _threads: Vec<JoinHandle<()>>,
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.work_ready.notify_all();
        debug!("job queue shutting down");
    }
}

/// Handle to the job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<Shared>,
    _pool: Arc<Pool>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("workers", &self.shared.workers)
            .field("out_root", &self.shared.validator.layout().out_root())
            .finish_non_exhaustive()
    }
}

impl JobQueue {
    /// Start a queue with `workers` threads (at least one) that validates and
    /// publishes into `layout`.
    pub fn new(
        runner: impl Runner + 'static,
        layout: StoreLayout,
        workers: usize,
    ) -> Result<Self, QueueError> {
        Self::with_runner(Arc::new(runner), layout, workers)
    }

    pub fn with_runner(
        runner: Arc<dyn Runner>,
        layout: StoreLayout,
        workers: usize,
    ) -> Result<Self, QueueError> {
        let workers = workers.max(1);
        let shared = Arc::new(Shared {
            runner,
            validator: Validator::new(layout.clone()),
            publisher: IndexPublisher::new(layout),
            table: JobTable::new(),
            state: Mutex::new(QueueState {
                fifo: VecDeque::new(),
                in_flight: 0,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            settled: Condvar::new(),
            workers,
        });

        let mut threads = Vec::with_capacity(workers);
        for worker in 0..workers {
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("cab-worker-{worker}"))
                .spawn(move || worker_loop(worker, worker_shared));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    // Release the workers that did start.
                    shared.state.lock().shutdown = true;
                    shared.work_ready.notify_all();
                    return Err(QueueError::Spawn(e));
                }
            }
        }

        info!(workers, "job queue started");
        Ok(Self {
            _pool: Arc::new(Pool {
                shared: Arc::clone(&shared),
                _threads: threads,
            }),
            shared,
        })
    }

    /// The layout this queue validates and publishes into.
    pub fn layout(&self) -> &StoreLayout {
        self.shared.validator.layout()
    }

    /// Accept a job. Returns immediately with the new job's id.
    pub fn submit(&self, inputs: JobInputs) -> Result<JobId, QueueError> {
        let expected = self.layout().out_root();
        if inputs.out_root.as_path() != expected {
            return Err(QueueError::OutRootMismatch {
                expected: expected.to_path_buf(),
                got: inputs.out_root,
            });
        }

        let job = Job::new(inputs);
        let id = job.id();
        info!(
            job_id = %id,
            track_id = %job.inputs().track_id,
            config_hash = %job.inputs().config_hash,
            "job submitted"
        );
        self.shared.table.insert(job);
        self.shared.state.lock().fifo.push_back(id);
        self.shared.work_ready.notify_one();
        Ok(id)
    }

    /// Snapshot of a job, if it exists.
    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.shared.table.get(id)
    }

    /// Block until every queued job has settled.
    pub fn drain(&self) {
        let mut state = self.shared.state.lock();
        while !state.is_settled() {
            self.shared.settled.wait(&mut state);
        }
    }

    /// Like [`drain()`](Self::drain) but gives up after `timeout`.
    /// Returns `true` if the queue settled in time.
    pub fn drain_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !state.is_settled() {
            if self
                .shared
                .settled
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.is_settled();
            }
        }
        true
    }

    pub fn stats(&self) -> QueueStats {
        let (queued, in_flight) = {
            let state = self.shared.state.lock();
            (state.fifo.len(), state.in_flight)
        };
        QueueStats {
            workers: self.shared.workers,
            queued,
            in_flight,
            jobs: self.shared.table.counts(),
        }
    }
}

fn worker_loop(worker: usize, shared: Arc<Shared>) {
    debug!(worker, "queue worker started");
    loop {
        let id = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    debug!(worker, "queue worker stopped");
                    return;
                }
                if let Some(id) = state.fifo.pop_front() {
                    state.in_flight += 1;
                    break id;
                }
                shared.work_ready.wait(&mut state);
            }
        };

        shared.process(&id);

        let mut state = shared.state.lock();
        state.in_flight -= 1;
        if state.is_settled() {
            shared.settled.notify_all();
        }
    }
}

impl Shared {
    fn process(&self, id: &JobId) {
        let inputs = match self.table.start(id) {
            Some(Ok(inputs)) => inputs,
            Some(Err(e)) => {
                warn!(job_id = %id, error = %e, "skipping job");
                return;
            }
            None => {
                warn!(job_id = %id, "queued job missing from table");
                return;
            }
        };
        debug!(job_id = %id, track_id = %inputs.track_id, "job started");

        let recorded = match self.execute(id, inputs) {
            Ok(result) => {
                info!(
                    job_id = %id,
                    artifact = %result.artifact_path.display(),
                    etag = %result.etag,
                    "job done"
                );
                self.table.complete(id, result)
            }
            Err(failure) => {
                warn!(job_id = %id, stage = failure.tag(), error = %failure, "job failed");
                self.table.fail(id, failure.to_string())
            }
        };
        if let Some(Err(e)) = recorded {
            warn!(job_id = %id, error = %e, "could not record job outcome");
        }
    }

    fn execute(&self, id: &JobId, inputs: JobInputs) -> Result<JobResult, JobFailure> {
        let track_id = inputs.track_id.clone();
        let request = RunRequest {
            job_id: *id,
            inputs,
        };

        let output = panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(&request)))
            .unwrap_or_else(|payload| Err(RunnerError::Panicked(panic_message(payload))))?;

        let validated = self.validator.validate(&output.artifact, &output.manifest)?;
        if validated.fingerprint.config_hash != request.inputs.config_hash {
            warn!(
                job_id = %id,
                requested = %request.inputs.config_hash,
                produced = %validated.fingerprint.config_hash,
                "runner stored artifact under a different config_hash"
            );
        }

        self.publisher.publish(
            &track_id,
            &validated.fingerprint,
            &validated.artifact_path,
            validated.etag,
        )?;

        Ok(JobResult {
            artifact_path: validated.artifact_path,
            manifest_path: validated.manifest_path,
            etag: validated.etag,
        })
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
