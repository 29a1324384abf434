//! # cab-core — Foundational Types for the Content-Addressed Broker
//!
//! Defines the type-system primitives every other crate in the workspace
//! builds on. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `JobId`, `TrackId`,
//!    `ConfigHash`, `SourceHash` are validated newtypes. A track id or a
//!    fingerprint segment that could escape the store layout cannot be
//!    constructed.
//!
//! 2. **One digest type.** `ContentDigest` is the SHA-256 of an artifact's
//!    bytes and doubles as its ETag. All hashing flows through
//!    [`sha256_bytes()`] or [`sha256_reader()`].
//!
//! 3. **Explicit job lifecycle.** `pending → running → {done, error}`.
//!    Transitions out of a terminal state are rejected, not ignored.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cab-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod identity;
pub mod job;

// Re-export primary types for ergonomic imports.
pub use digest::{sha256_bytes, sha256_file, sha256_reader, ContentDigest};
pub use error::IdentifierError;
pub use identity::{ConfigHash, Fingerprint, JobId, SourceHash, TrackId};
pub use job::{Job, JobError, JobInputs, JobResult, JobSnapshot, JobStatus};
