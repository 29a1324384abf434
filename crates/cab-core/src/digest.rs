//! # Content Digest
//!
//! SHA-256 digests over raw artifact bytes. The lowercase hex rendering of
//! a digest is what the broker publishes as the artifact's ETag and what
//! manifests declare under `artifact.sha256`.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::IdentifierError;

/// A SHA-256 content digest.
///
/// Serializes as a 64-character lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Parse a 64-character hex string. Case-insensitive.
    pub fn from_hex(hex: &str) -> Result<Self, IdentifierError> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(IdentifierError::InvalidDigest(format!(
                "digest must be 64 hex chars, got {} chars",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|_| IdentifierError::InvalidDigest("digest is not ASCII".into()))?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| {
                IdentifierError::InvalidDigest(format!("invalid hex at position {}", i * 2))
            })?;
        }
        Ok(Self(bytes))
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest(bytes)
}

/// SHA-256 of everything readable from `reader`, streamed in fixed-size
/// chunks so large artifacts are never held in memory.
pub fn sha256_reader(mut reader: impl Read) -> io::Result<ContentDigest> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    Ok(ContentDigest(bytes))
}

/// SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> io::Result<ContentDigest> {
    sha256_reader(File::open(path)?)
}
