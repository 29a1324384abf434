//! # API Route Modules
//!
//! - `jobs`: job submission and polling.
//! - `index`: per-track pointer records.
//! - `artifacts`: artifact and manifest delivery with ETag revalidation.

pub mod artifacts;
pub mod index;
pub mod jobs;
