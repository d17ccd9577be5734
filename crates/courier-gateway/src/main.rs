//! Courier entry point
//!
//! Run with:
//! ```bash
//! courier --token <bot token> [--shards N] [--clusters N --cluster-id N]
//! ```
//!
//! Everything else is loaded from environment variables.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use courier_cache::{CacheProjection, RedisStore};
use courier_common::{try_init_tracing, AppConfig};
use courier_gateway::{Manager, ManagerOptions, RedisBroker};

/// Gateway producer: shards in, cache projection and stream events out
#[derive(Debug, Parser)]
#[command(name = "courier", version)]
struct Cli {
    /// Bot token used to authenticate
    #[arg(long)]
    token: String,

    /// Shard count to use; 0 means the server recommendation
    #[arg(long, default_value_t = 0)]
    shards: u32,

    /// How many clusters are running
    #[arg(long, default_value_t = 1)]
    clusters: u32,

    /// Which cluster this process is
    #[arg(long, default_value_t = 0)]
    cluster_id: u32,
}

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Producer failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    config.gateway.shard_count = cli.shards;
    config.gateway.cluster_count = cli.clusters.max(1);
    config.gateway.cluster_id = cli.cluster_id;

    info!(
        env = ?config.app.env,
        namespace = %config.cache.namespace,
        "Configuration loaded"
    );

    let store = RedisStore::from_config(&config.redis)?;
    store.health_check().await?;

    let cache = CacheProjection::new(Arc::new(store.clone()), config.cache.clone());
    let broker = Arc::new(RedisBroker::new(store));

    let manager = Manager::new(
        ManagerOptions {
            token: cli.token,
            config,
            presence: None,
        },
        cache,
        broker,
    );

    manager.open().await?;
    info!("Shards started; send SIGINT or SIGTERM to shut down");

    wait_for_shutdown().await;

    manager.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(interrupt) => interrupt,
        Err(e) => {
            error!(error = %e, "Failed to install SIGINT handler");
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => info!("Received SIGINT"),
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
}
