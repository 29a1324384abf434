//! # cab-queue — Asynchronous Job Execution
//!
//! Accepts job submissions without blocking and executes them on a
//! bounded pool of OS threads. Each job runs the same pipeline:
//!
//! ```text
//! runner.run(request) ──▶ Validator::validate ──▶ IndexPublisher::publish
//!        │                        │                        │
//!   runner_failed          validation_failed         publish_failed
//! ```
//!
//! A failure at any stage marks the job `error` with the tagged message of
//! [`JobFailure`]. No index entry is written for a failed job, and a failed
//! job never takes its worker down with it.
//!
//! ## Runners
//!
//! The computation itself is behind the [`Runner`] trait. Closures
//! implement it directly; [`CommandRunner`] drives an external program over
//! stdin/stdout JSON.

pub mod error;
pub mod queue;
pub mod runner;
pub mod table;

pub use error::{JobFailure, QueueError, RunnerError};
pub use queue::{JobQueue, QueueStats};
pub use runner::{CommandRunner, RunOutput, RunRequest, Runner};
pub use table::{JobTable, StatusCounts};
