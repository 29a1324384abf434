//! # Identifier Newtypes
//!
//! Newtype wrappers for the broker's identifiers. Track ids and
//! fingerprint halves end up as file and directory names under the store
//! root, so their constructors reject anything that is not a single, plain
//! path segment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentifierError;

/// Directory names under `echo/` that a fingerprint segment may not take.
const RESERVED_SEGMENTS: &[&str] = &["index", "jobs"];

/// Longest accepted segment, in bytes.
const MAX_SEGMENT_LEN: usize = 255;

/// Suffix of a track's index file.
const INDEX_SUFFIX: &str = ".json";

/// Longest accepted track id: its index file name must still be a valid
/// segment.
pub const MAX_TRACK_ID_LEN: usize = MAX_SEGMENT_LEN - INDEX_SUFFIX.len();

/// Check that `value` is usable as exactly one path segment, returning the
/// reason when it is not.
pub fn check_segment(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("must not be empty");
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err("longer than 255 bytes");
    }
    if value == "." || value == ".." {
        return Err("is a relative path component");
    }
    if value.contains('/') || value.contains('\\') {
        return Err("contains a path separator");
    }
    if value.contains('\0') {
        return Err("contains a NUL byte");
    }
    Ok(())
}

/// Opaque identifier of a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random job identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id from its string form.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdentifierError::InvalidJobId(s.to_string()))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the track an index entry points for.
///
/// Free-form text (spaces, punctuation and unicode are fine) as long as it
/// is usable as a single file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackId(String);

impl TrackId {
    /// Create a validated track id.
    pub fn new(s: impl Into<String>) -> Result<Self, IdentifierError> {
        let s = s.into();
        check_segment(&s).map_err(|reason| IdentifierError::InvalidTrackId(s.clone(), reason))?;
        if s.len() > MAX_TRACK_ID_LEN {
            return Err(IdentifierError::InvalidTrackId(s, "longer than 250 bytes"));
        }
        Ok(Self(s))
    }

    /// Return the track id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this track's index entry.
    pub fn index_file_name(&self) -> String {
        format!("{}{INDEX_SUFFIX}", self.0)
    }
}

impl TryFrom<String> for TrackId {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TrackId> for String {
    fn from(id: TrackId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! fingerprint_segment {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated fingerprint segment.
            pub fn new(s: impl Into<String>) -> Result<Self, IdentifierError> {
                let s = s.into();
                let reason = check_segment(&s).err().or_else(|| {
                    RESERVED_SEGMENTS
                        .contains(&s.as_str())
                        .then_some("reserved name")
                });
                match reason {
                    Some(reason) => Err(IdentifierError::InvalidFingerprint {
                        kind: $kind,
                        value: s,
                        reason,
                    }),
                    None => Ok(Self(s)),
                }
            }

            /// Return the segment as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentifierError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

fingerprint_segment!(
    /// Hash of the analysis configuration; first half of a fingerprint.
    ConfigHash,
    "config_hash"
);

fingerprint_segment!(
    /// Hash of the analysed source content; second half of a fingerprint.
    SourceHash,
    "source_hash"
);

/// The pair that identifies one computation: its parameters and its input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub config_hash: ConfigHash,
    pub source_hash: SourceHash,
}

impl Fingerprint {
    pub fn new(config_hash: ConfigHash, source_hash: SourceHash) -> Self {
        Self {
            config_hash,
            source_hash,
        }
    }

    /// Validate both halves from raw strings.
    pub fn parse(config_hash: &str, source_hash: &str) -> Result<Self, IdentifierError> {
        Ok(Self::new(
            ConfigHash::new(config_hash)?,
            SourceHash::new(source_hash)?,
        ))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.config_hash, self.source_hash)
    }
}
