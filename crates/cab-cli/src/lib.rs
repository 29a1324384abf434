//! # cab-cli — Command Line for the Content-Addressed Broker
//!
//! ## Subcommands
//!
//! - `cab serve` — Run the HTTP broker and its worker pool.
//! - `cab verify` — Check an artifact against its manifest, offline.
//! - `cab index` — Print a track's index record.
//!
//! Every store-facing subcommand takes the same [`StoreArgs`], each flag
//! with a `CAB_*` environment fallback:
//!
//! ```bash
//! CAB_CAS_ROOT=/srv/echo_cas cab serve --runner ./bin/echo-runner
//! cab verify echo/cfg/src/historical_echo.json echo/cfg/src/manifest.json
//! cab index --cas-root /srv/echo_cas "Track One"
//! ```

pub mod index;
pub mod serve;
pub mod verify;

use std::path::PathBuf;

use cab_store::layout::{DEFAULT_ARTIFACT_NAME, DEFAULT_MANIFEST_NAME};
use cab_store::StoreLayout;
use clap::Args;

/// Where the artifact tree lives and what its files are called.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Root of the artifact tree.
    #[arg(long, env = "CAB_CAS_ROOT", default_value = "data/echo_cas")]
    pub cas_root: PathBuf,

    /// File name of the artifact inside a fingerprint directory.
    #[arg(long, env = "CAB_ARTIFACT_NAME", default_value = DEFAULT_ARTIFACT_NAME)]
    pub artifact_name: String,

    /// File name of the manifest inside a fingerprint directory.
    #[arg(long, env = "CAB_MANIFEST_NAME", default_value = DEFAULT_MANIFEST_NAME)]
    pub manifest_name: String,
}

impl StoreArgs {
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::with_names(
            self.cas_root.clone(),
            self.artifact_name.clone(),
            self.manifest_name.clone(),
        )
    }
}
