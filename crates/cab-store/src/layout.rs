//! # Store Layout
//!
//! Pure path arithmetic over the `out_root` tree. Nothing here touches the
//! filesystem except [`StoreLayout::fingerprint_of()`], which canonicalizes
//! as a fallback when a runner reports paths through a symlink or a
//! relative root.

use std::path::{Component, Path, PathBuf};

use cab_core::{Fingerprint, TrackId};

/// Default artifact file name inside a fingerprint directory.
pub const DEFAULT_ARTIFACT_NAME: &str = "historical_echo.json";

/// Default manifest file name inside a fingerprint directory.
pub const DEFAULT_MANIFEST_NAME: &str = "manifest.json";

const ECHO_DIR: &str = "echo";
const INDEX_DIR: &str = "index";

/// Path scheme for one `out_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    out_root: PathBuf,
    artifact_name: String,
    manifest_name: String,
}

impl StoreLayout {
    /// Layout with the default artifact and manifest file names.
    pub fn new(out_root: impl Into<PathBuf>) -> Self {
        Self::with_names(out_root, DEFAULT_ARTIFACT_NAME, DEFAULT_MANIFEST_NAME)
    }

    pub fn with_names(
        out_root: impl Into<PathBuf>,
        artifact_name: impl Into<String>,
        manifest_name: impl Into<String>,
    ) -> Self {
        Self {
            out_root: out_root.into(),
            artifact_name: artifact_name.into(),
            manifest_name: manifest_name.into(),
        }
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// `out_root/echo`
    pub fn echo_root(&self) -> PathBuf {
        self.out_root.join(ECHO_DIR)
    }

    /// `out_root/echo/<config_hash>/<source_hash>`
    pub fn fingerprint_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.echo_root()
            .join(fingerprint.config_hash.as_str())
            .join(fingerprint.source_hash.as_str())
    }

    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.fingerprint_dir(fingerprint).join(&self.artifact_name)
    }

    pub fn manifest_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.fingerprint_dir(fingerprint).join(&self.manifest_name)
    }

    /// `out_root/echo/index`
    pub fn index_dir(&self) -> PathBuf {
        self.echo_root().join(INDEX_DIR)
    }

    /// `out_root/echo/index/<track_id>.json`
    pub fn index_path(&self, track_id: &TrackId) -> PathBuf {
        self.index_dir().join(track_id.index_file_name())
    }

    /// Broker URL of a file inside a fingerprint directory:
    /// `/echo/<config_hash>/<source_hash>/<file_name>`.
    pub fn url_path(fingerprint: &Fingerprint, file_name: &str) -> String {
        format!(
            "/{ECHO_DIR}/{}/{}/{file_name}",
            fingerprint.config_hash, fingerprint.source_hash
        )
    }

    /// Recover the fingerprint of a file stored at
    /// `out_root/echo/<config_hash>/<source_hash>/<file>`.
    ///
    /// Returns `None` for anything that is not exactly three levels below
    /// `echo/` or whose segments are not valid fingerprint halves.
    pub fn fingerprint_of(&self, path: &Path) -> Option<Fingerprint> {
        let echo_root = self.echo_root();
        if let Some(fp) = path
            .strip_prefix(&echo_root)
            .ok()
            .and_then(fingerprint_from_relative)
        {
            return Some(fp);
        }
        let root = std::fs::canonicalize(&echo_root).ok()?;
        let full = std::fs::canonicalize(path).ok()?;
        fingerprint_from_relative(full.strip_prefix(&root).ok()?)
    }
}

fn fingerprint_from_relative(relative: &Path) -> Option<Fingerprint> {
    let segments: Vec<&str> = relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    match segments.as_slice() {
        [config_hash, source_hash, _file] => Fingerprint::parse(config_hash, source_hash).ok(),
        _ => None,
    }
}
