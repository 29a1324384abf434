//! # Content-Addressed Store
//!
//! Artifacts are keyed by fingerprint and file name. Writes go to a
//! temporary file in the destination directory and are moved into place
//! with a no-clobber rename, so a reader never sees a partial file and a
//! stored file is never replaced.
//!
//! ## Idempotence
//!
//! Re-putting identical bytes is a no-op. Putting different bytes under an
//! occupied name is a [`StoreError::FingerprintConflict`]: one fingerprint
//! never yields two different byte sets.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cab_core::identity::check_segment;
use cab_core::{sha256_bytes, ContentDigest, Fingerprint};
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::layout::StoreLayout;
use crate::manifest::Manifest;

/// Storage keyed by `(fingerprint, file name)`.
pub trait ContentAddressedStore: Send + Sync {
    /// Store `bytes` under `name` in the fingerprint's directory and return
    /// the resulting path.
    fn put(&self, fingerprint: &Fingerprint, name: &str, bytes: &[u8])
        -> Result<PathBuf, StoreError>;

    /// Read a stored file. `Ok(None)` if it does not exist.
    fn get(&self, fingerprint: &Fingerprint, name: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// What [`FsArtifactStore::write_artifact()`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub fingerprint: Fingerprint,
    pub artifact_path: PathBuf,
    pub manifest_path: PathBuf,
    pub etag: ContentDigest,
}

/// Local-disk store rooted at a [`StoreLayout`].
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    layout: StoreLayout,
}

impl FsArtifactStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Store an artifact together with a manifest describing it.
    ///
    /// Intended for runners: the pair written here always passes
    /// validation.
    pub fn write_artifact(
        &self,
        fingerprint: &Fingerprint,
        bytes: &[u8],
    ) -> Result<StoredArtifact, StoreError> {
        let artifact_name = self.layout.artifact_name();
        let manifest_name = self.layout.manifest_name();
        let etag = sha256_bytes(bytes);

        let artifact_path = self.put(fingerprint, artifact_name, bytes)?;
        let manifest = Manifest::for_artifact(&etag, artifact_name, bytes.len() as u64);
        let manifest_path = self.layout.manifest_path(fingerprint);
        let manifest_bytes =
            manifest
                .to_vec_pretty()
                .map_err(|source| StoreError::Serialization {
                    path: manifest_path,
                    source,
                })?;
        let manifest_path = self.put(fingerprint, manifest_name, &manifest_bytes)?;

        Ok(StoredArtifact {
            fingerprint: fingerprint.clone(),
            artifact_path,
            manifest_path,
            etag,
        })
    }
}

impl ContentAddressedStore for FsArtifactStore {
    fn put(
        &self,
        fingerprint: &Fingerprint,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        check_segment(name).map_err(|reason| StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })?;

        let dir = self.layout.fingerprint_dir(fingerprint);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let path = dir.join(name);

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                tracing::debug!(
                    config_hash = %fingerprint.config_hash,
                    source_hash = %fingerprint.source_hash,
                    name,
                    size = bytes.len(),
                    "stored artifact file"
                );
                Ok(path)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                if same_content(&path, bytes)? {
                    Ok(path)
                } else {
                    tracing::warn!(path = %path.display(), "refusing to overwrite stored artifact");
                    Err(StoreError::FingerprintConflict { path })
                }
            }
            Err(e) => Err(StoreError::io(&path, e.error)),
        }
    }

    fn get(&self, fingerprint: &Fingerprint, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_segment(name).map_err(|reason| StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        let path = self.layout.fingerprint_dir(fingerprint).join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

fn same_content(path: &Path, bytes: &[u8]) -> Result<bool, StoreError> {
    let existing = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    Ok(existing == bytes)
}
