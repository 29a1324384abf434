//! # Artifact Manifest
//!
//! Sidecar JSON written next to every artifact:
//!
//! ```json
//! {"artifact": {"sha256": "<hex>", "etag": "<hex>", "path": "historical_echo.json", "size": 123}}
//! ```
//!
//! Only `artifact.sha256` is required. `sha256` is kept as the raw string a
//! runner wrote so that a malformed value surfaces as a hash mismatch
//! rather than a parse failure. Unknown fields are preserved.

use cab_core::ContentDigest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub artifact: ManifestArtifact,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `artifact` block of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestArtifact {
    /// Declared SHA-256 of the artifact bytes, hex.
    pub sha256: String,
    /// Declared ETag. When present it must equal `sha256`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Artifact file name, relative to the manifest's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Manifest describing an artifact with the given digest.
    pub fn for_artifact(digest: &ContentDigest, file_name: &str, size: u64) -> Self {
        let hex = digest.to_hex();
        Self {
            artifact: ManifestArtifact {
                sha256: hex.clone(),
                etag: Some(hex),
                path: Some(file_name.to_string()),
                size: Some(size),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Parse a manifest from bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Render as pretty-printed JSON.
    pub fn to_vec_pretty(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Declared ETag with any surrounding quotes removed.
    pub fn declared_etag(&self) -> Option<&str> {
        self.artifact
            .etag
            .as_deref()
            .map(|e| e.trim().trim_matches('"'))
    }
}
