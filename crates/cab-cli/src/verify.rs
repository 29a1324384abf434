//! # Verify Subcommand
//!
//! Re-hashes an artifact and compares it with its manifest, exactly as the
//! queue does before publishing. With `--within-store` the two files must
//! also sit in one fingerprint directory of the store.
//!
//! Exit code 0 when the artifact is intact, 1 otherwise.

use std::path::PathBuf;

use anyhow::Result;
use cab_store::{verify_artifact, Validator};
use clap::Args;

use crate::StoreArgs;

/// Arguments for `cab verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Artifact file.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,

    /// Manifest describing the artifact.
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Also require both files to belong to one fingerprint under `--cas-root`.
    #[arg(long)]
    pub within_store: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Execute the verify subcommand.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let outcome = if args.within_store {
        Validator::new(args.store.layout())
            .validate(&args.artifact, &args.manifest)
            .map(|v| format!("fingerprint={} etag={}", v.fingerprint, v.etag))
    } else {
        verify_artifact(&args.artifact, &args.manifest).map(|etag| format!("etag={etag}"))
    };

    match outcome {
        Ok(summary) => {
            println!("OK: {summary}");
            Ok(0)
        }
        Err(e) => {
            eprintln!("FAIL: {e}");
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cab_core::Fingerprint;
    use cab_store::{FsArtifactStore, StoreLayout};

    fn args(store: &StoreLayout, artifact: PathBuf, manifest: PathBuf, within: bool) -> VerifyArgs {
        VerifyArgs {
            artifact,
            manifest,
            within_store: within,
            store: StoreArgs {
                cas_root: store.out_root().to_path_buf(),
                artifact_name: store.artifact_name().to_string(),
                manifest_name: store.manifest_name().to_string(),
            },
        }
    }

    #[test]
    fn intact_artifact_passes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        let stored = FsArtifactStore::new(layout.clone())
            .write_artifact(&Fingerprint::parse("cfg", "src").unwrap(), b"{\"n\": 1}")
            .unwrap();

        let plain = args(&layout, stored.artifact_path.clone(), stored.manifest_path.clone(), false);
        assert_eq!(run_verify(&plain).unwrap(), 0);
        let strict = args(&layout, stored.artifact_path, stored.manifest_path, true);
        assert_eq!(run_verify(&strict).unwrap(), 0);
    }

    #[test]
    fn modified_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        let stored = FsArtifactStore::new(layout.clone())
            .write_artifact(&Fingerprint::parse("cfg", "src").unwrap(), b"{\"n\": 1}")
            .unwrap();
        std::fs::write(&stored.artifact_path, b"{\"n\": 2}").unwrap();

        let args = args(&layout, stored.artifact_path, stored.manifest_path, false);
        assert_eq!(run_verify(&args).unwrap(), 1);
    }

    #[test]
    fn within_store_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = StoreLayout::new(dir.path().join("elsewhere"));
        let stored = FsArtifactStore::new(elsewhere)
            .write_artifact(&Fingerprint::parse("cfg", "src").unwrap(), b"{}")
            .unwrap();

        let layout = StoreLayout::new(dir.path().join("cas"));
        let loose = args(&layout, stored.artifact_path.clone(), stored.manifest_path.clone(), false);
        assert_eq!(run_verify(&loose).unwrap(), 0);
        let strict = args(&layout, stored.artifact_path, stored.manifest_path, true);
        assert_eq!(run_verify(&strict).unwrap(), 1);
    }
}
