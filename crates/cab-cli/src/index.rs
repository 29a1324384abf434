//! # Index Subcommand
//!
//! Prints a track's index record as pretty JSON. Exit code 1 when the track
//! has no record yet.

use anyhow::{Context, Result};
use cab_core::TrackId;
use cab_store::IndexPublisher;
use clap::Args;

use crate::StoreArgs;

/// Arguments for `cab index`.
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Track whose record to print.
    #[arg(value_name = "TRACK_ID")]
    pub track_id: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Execute the index subcommand.
pub fn run_index(args: &IndexArgs) -> Result<u8> {
    let track_id = TrackId::new(args.track_id.as_str())
        .with_context(|| format!("invalid track id {:?}", args.track_id))?;
    let publisher = IndexPublisher::new(args.store.layout());

    match publisher.read(&track_id)? {
        Some(entry) => {
            println!("{}", serde_json::to_string_pretty(&entry)?);
            Ok(0)
        }
        None => {
            eprintln!(
                "no index record for track {track_id} under {}",
                args.store.cas_root.display()
            );
            Ok(1)
        }
    }
}
