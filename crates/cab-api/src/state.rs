//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The broker owns no data of its own: jobs live in the [`JobQueue`]'s
//! table, artifacts and index entries on disk under `cas_root`.

use std::path::PathBuf;
use std::sync::Arc;

use cab_queue::{JobQueue, QueueError, Runner};
use cab_store::layout::{DEFAULT_ARTIFACT_NAME, DEFAULT_MANIFEST_NAME};
use cab_store::{FsArtifactStore, IndexPublisher, StoreLayout};

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Root of the artifact tree (`out_root` for every job).
    pub cas_root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Number of queue worker threads.
    pub workers: usize,
    pub artifact_name: String,
    pub manifest_name: String,
    /// Used for submissions that carry no `config_hash`.
    pub default_config_hash: String,
}

impl BrokerConfig {
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::with_names(
            self.cas_root.clone(),
            self.artifact_name.clone(),
            self.manifest_name.clone(),
        )
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cas_root: PathBuf::from("data/echo_cas"),
            host: "127.0.0.1".to_string(),
            port: 8099,
            workers: 2,
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            default_config_hash: "default".to_string(),
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub queue: JobQueue,
    pub store: Arc<FsArtifactStore>,
    pub index: Arc<IndexPublisher>,
}

impl AppState {
    /// Start the job queue for `config` and wrap everything for handlers.
    pub fn new(config: BrokerConfig, runner: Arc<dyn Runner>) -> Result<Self, QueueError> {
        let layout = config.layout();
        let queue = JobQueue::with_runner(runner, layout.clone(), config.workers)?;
        Ok(Self {
            config: Arc::new(config),
            queue,
            store: Arc::new(FsArtifactStore::new(layout.clone())),
            index: Arc::new(IndexPublisher::new(layout)),
        })
    }

    pub fn layout(&self) -> &StoreLayout {
        self.store.layout()
    }
}
