//! # Serve Subcommand
//!
//! Starts the job queue and the Axum broker on `host:port`. Jobs are run by
//! an external program (`--runner`), one process per job: the job is written
//! to its stdin as JSON and it answers with the artifact and manifest paths
//! on stdout.
//!
//! On Ctrl-C the listener stops accepting requests, then the queue is drained
//! so no accepted job is lost mid-run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cab_api::state::{AppState, BrokerConfig};
use cab_core::ConfigHash;
use cab_queue::CommandRunner;
use clap::Args;

use crate::StoreArgs;

/// Arguments for `cab serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Address to listen on.
    #[arg(long, env = "CAB_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "CAB_PORT", default_value_t = 8099)]
    pub port: u16,

    /// Worker threads running jobs concurrently.
    #[arg(long, env = "CAB_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Config hash for submissions that do not name one.
    #[arg(long, env = "CAB_DEFAULT_CONFIG_HASH", default_value = "default")]
    pub default_config_hash: String,

    /// Program that executes one job.
    #[arg(long, env = "CAB_RUNNER", value_name = "PROGRAM")]
    pub runner: PathBuf,

    /// Extra argument for the runner program. Repeatable.
    #[arg(long = "runner-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub runner_args: Vec<String>,
}

impl ServeArgs {
    /// Broker configuration described by these arguments.
    pub fn broker_config(&self) -> Result<BrokerConfig> {
        ConfigHash::new(self.default_config_hash.as_str())
            .context("invalid --default-config-hash")?;
        Ok(BrokerConfig {
            cas_root: self.store.cas_root.clone(),
            host: self.host.clone(),
            port: self.port,
            workers: self.workers,
            artifact_name: self.store.artifact_name.clone(),
            manifest_name: self.store.manifest_name.clone(),
            default_config_hash: self.default_config_hash.clone(),
        })
    }

    pub fn runner(&self) -> CommandRunner {
        CommandRunner::new(&self.runner).args(self.runner_args.iter().cloned())
    }
}

/// Execute the serve subcommand. Blocks until shutdown.
pub fn run_serve(args: &ServeArgs) -> Result<u8> {
    let config = args.broker_config()?;
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, Arc::new(args.runner()))
        .context("failed to start the job queue")?;

    tracing::info!(
        cas_root = %state.config.cas_root.display(),
        workers = state.config.workers,
        runner = %args.runner.display(),
        "broker configured"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;

    let app = cab_api::app(state.clone());
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!("cab broker listening on {addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")
    })?;

    let stats = state.queue.stats();
    tracing::info!(
        queued = stats.queued,
        in_flight = stats.in_flight,
        "draining job queue"
    );
    state.queue.drain();
    tracing::info!("shutdown complete");
    Ok(0)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
