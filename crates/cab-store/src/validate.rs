//! # Artifact Validation
//!
//! Nothing is published or served without passing through here. The
//! artifact's bytes are streamed into SHA-256 and compared in constant time
//! against the digest its manifest declares.
//!
//! [`verify_artifact()`] checks content only. [`Validator::validate()`]
//! additionally requires the artifact to sit inside the store layout, next
//! to its manifest, so that the fingerprint can be read off its path.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use cab_core::{sha256_reader, ContentDigest, Fingerprint};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::layout::StoreLayout;
use crate::manifest::Manifest;

/// Why an artifact was rejected.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("artifact not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("manifest {} is malformed: {reason}", path.display())]
    ManifestMalformed { path: PathBuf, reason: String },

    #[error("artifact sha256 {actual} does not match manifest sha256 {declared:?}")]
    HashMismatch {
        declared: String,
        actual: ContentDigest,
    },

    #[error("manifest etag {etag:?} disagrees with its sha256 {sha256:?}")]
    EtagMismatch { etag: String, sha256: String },

    #[error("{} is outside the store layout: {reason}", path.display())]
    OutsideLayout { path: PathBuf, reason: &'static str },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A validated artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub fingerprint: Fingerprint,
    pub etag: ContentDigest,
    pub artifact_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Check an artifact's bytes against its manifest, returning the digest
/// (the artifact's ETag) on success.
pub fn verify_artifact(
    artifact_path: &Path,
    manifest_path: &Path,
) -> Result<ContentDigest, ValidationError> {
    let manifest_bytes = std::fs::read(manifest_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ValidationError::ManifestMissing(manifest_path.to_path_buf()),
        _ => ValidationError::Io {
            path: manifest_path.to_path_buf(),
            source: e,
        },
    })?;
    let manifest =
        Manifest::from_slice(&manifest_bytes).map_err(|e| ValidationError::ManifestMalformed {
            path: manifest_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let file = File::open(artifact_path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ValidationError::ArtifactMissing(artifact_path.to_path_buf()),
        _ => ValidationError::Io {
            path: artifact_path.to_path_buf(),
            source: e,
        },
    })?;
    let actual = sha256_reader(file).map_err(|e| ValidationError::Io {
        path: artifact_path.to_path_buf(),
        source: e,
    })?;

    check_digest(&manifest, actual)
}

/// Compare a computed digest with what `manifest` declares.
///
/// The declared ETag, when present, must agree with the declared sha256.
pub fn check_digest(
    manifest: &Manifest,
    actual: ContentDigest,
) -> Result<ContentDigest, ValidationError> {
    let declared = manifest.artifact.sha256.trim();
    if let Some(etag) = manifest.declared_etag() {
        if !etag.eq_ignore_ascii_case(declared) {
            return Err(ValidationError::EtagMismatch {
                etag: etag.to_string(),
                sha256: declared.to_string(),
            });
        }
    }

    // A declared value that is not even a digest can never match.
    let matches = ContentDigest::from_hex(declared)
        .map(|d| bool::from(d.as_bytes().ct_eq(actual.as_bytes())))
        .unwrap_or(false);
    if !matches {
        return Err(ValidationError::HashMismatch {
            declared: declared.to_string(),
            actual,
        });
    }
    Ok(actual)
}

/// Layout-aware validator used by the job queue.
#[derive(Debug, Clone)]
pub struct Validator {
    layout: StoreLayout,
}

impl Validator {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Validate content, then place the artifact in the layout.
    pub fn validate(
        &self,
        artifact_path: &Path,
        manifest_path: &Path,
    ) -> Result<Validated, ValidationError> {
        let etag = verify_artifact(artifact_path, manifest_path)?;

        let fingerprint =
            self.layout
                .fingerprint_of(artifact_path)
                .ok_or_else(|| ValidationError::OutsideLayout {
                    path: artifact_path.to_path_buf(),
                    reason: "not at echo/<config_hash>/<source_hash>/<file>",
                })?;

        // Only the configured artifact name is ever served.
        if file_name(artifact_path) != Some(self.layout.artifact_name()) {
            return Err(ValidationError::OutsideLayout {
                path: artifact_path.to_path_buf(),
                reason: "artifact must use the configured artifact name",
            });
        }

        if file_name(manifest_path) != Some(self.layout.manifest_name())
            || self.layout.fingerprint_of(manifest_path).as_ref() != Some(&fingerprint)
        {
            return Err(ValidationError::OutsideLayout {
                path: manifest_path.to_path_buf(),
                reason: "manifest must sit next to its artifact under the configured name",
            });
        }

        Ok(Validated {
            fingerprint,
            etag,
            artifact_path: artifact_path.to_path_buf(),
            manifest_path: manifest_path.to_path_buf(),
        })
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
