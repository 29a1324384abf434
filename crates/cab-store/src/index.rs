//! # Track Index
//!
//! One pointer record per track at `out_root/echo/index/<track_id>.json`,
//! naming the broker URLs of the track's latest validated artifact and
//! manifest. Records are replaced whole: written to a temporary file in the
//! index directory, synced, then renamed over the old record. Concurrent
//! readers see either the old or the new record, never a mix.
//!
//! Last write wins per track.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use cab_core::{ConfigHash, ContentDigest, Fingerprint, SourceHash, TrackId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::layout::StoreLayout;

/// The pointer record for a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub track_id: TrackId,
    pub config_hash: ConfigHash,
    pub source_hash: SourceHash,
    /// Broker URL of the artifact.
    pub artifact: String,
    /// Broker URL of the manifest.
    pub manifest: String,
    pub etag: ContentDigest,
}

impl IndexEntry {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.config_hash.clone(), self.source_hash.clone())
    }
}

/// Writes and reads index records.
#[derive(Debug)]
pub struct IndexPublisher {
    layout: StoreLayout,
    write_lock: Mutex<()>,
}

impl IndexPublisher {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            write_lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Point `track_id` at a validated artifact.
    ///
    /// Callers must have validated the artifact; this only records where
    /// it lives.
    pub fn publish(
        &self,
        track_id: &TrackId,
        fingerprint: &Fingerprint,
        artifact_path: &Path,
        etag: ContentDigest,
    ) -> Result<IndexEntry, StoreError> {
        let artifact_name = artifact_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidName {
                name: artifact_path.display().to_string(),
                reason: "artifact path has no UTF-8 file name",
            })?;

        let entry = IndexEntry {
            track_id: track_id.clone(),
            config_hash: fingerprint.config_hash.clone(),
            source_hash: fingerprint.source_hash.clone(),
            artifact: StoreLayout::url_path(fingerprint, artifact_name),
            manifest: StoreLayout::url_path(fingerprint, self.layout.manifest_name()),
            etag,
        };

        let path = self.layout.index_path(track_id);
        let bytes = serde_json::to_vec_pretty(&entry).map_err(|source| {
            StoreError::Serialization {
                path: path.clone(),
                source,
            }
        })?;

        let dir = self.layout.index_dir();
        let _guard = self.write_lock.lock();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;

        tracing::info!(
            track_id = %track_id,
            config_hash = %fingerprint.config_hash,
            source_hash = %fingerprint.source_hash,
            etag = %etag,
            "published index entry"
        );
        Ok(entry)
    }

    /// Current record for `track_id`, if any.
    pub fn read(&self, track_id: &TrackId) -> Result<Option<IndexEntry>, StoreError> {
        let path = self.layout.index_path(track_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serialization { path, source })
    }
}
