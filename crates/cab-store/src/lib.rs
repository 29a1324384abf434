//! # cab-store — Artifact Storage, Validation and the Track Index
//!
//! Everything the broker keeps on disk lives under one `out_root`:
//!
//! ```text
//! out_root/echo/<config_hash>/<source_hash>/<artifact_name>
//! out_root/echo/<config_hash>/<source_hash>/<manifest_name>
//! out_root/echo/index/<track_id>.json
//! ```
//!
//! - [`StoreLayout`] maps fingerprints and track ids to those paths.
//! - [`ContentAddressedStore`] / [`FsArtifactStore`] write artifacts with
//!   no-clobber semantics; a fingerprint's bytes never change once written.
//! - [`Validator`] checks an artifact against its manifest before anything
//!   is published.
//! - [`IndexPublisher`] atomically replaces a track's pointer record.
//!
//! ## Integrity Invariant
//!
//! For every published [`IndexEntry`]:
//! `sha256(artifact bytes) == manifest.artifact.sha256 == entry.etag`.

pub mod error;
pub mod index;
pub mod layout;
pub mod manifest;
pub mod store;
pub mod validate;

pub use error::StoreError;
pub use index::{IndexEntry, IndexPublisher};
pub use layout::StoreLayout;
pub use manifest::{Manifest, ManifestArtifact};
pub use store::{ContentAddressedStore, FsArtifactStore, StoredArtifact};
pub use validate::{check_digest, verify_artifact, Validated, ValidationError, Validator};
