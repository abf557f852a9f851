//! Collector daemon binary.
//!
//! Wires up one collector process from environment configuration:
//!
//! - selects the chain adapter (`CHAIN`),
//! - opens the external data cache under `DATA_DIR`,
//! - spawns the metrics HTTP server and the poll loop,
//! - runs until SIGINT/SIGTERM.
//!
//! A failed poll cycle logs and continues; only a signal stops the
//! process.

use tokio::signal;
use tracing::{error, info};

use collector::{
    Collector, CollectorConfig, ExternalDataCache, SnapshotPublisher, build_adapter,
    run_metrics_server,
};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "exporter=info,collector=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = CollectorConfig::from_env().map_err(|e| format!("configuration error: {e}"))?;

    std::fs::create_dir_all(&cfg.data_dir)
        .map_err(|e| format!("failed to create data dir {}: {e}", cfg.data_dir.display()))?;

    // ---------------------------
    // Chain adapter + cache
    // ---------------------------

    let adapter =
        build_adapter(&cfg).map_err(|e| format!("failed to build {} adapter: {e}", cfg.chain))?;
    let cache = ExternalDataCache::open(cfg.data_dir.join("external-cache.json"));

    // ---------------------------
    // Snapshot hand-off + server
    // ---------------------------

    let publisher = SnapshotPublisher::new(cfg.data_dir.join("metrics.prom"));
    let handle = publisher.handle();

    let listen_addr = cfg.listen_addr;
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(handle, listen_addr).await {
            error!("metrics server error: {e}");
        }
    });

    // ---------------------------
    // Poll loop
    // ---------------------------

    let collector = Collector::new(adapter, cache, publisher, &cfg)
        .map_err(|e| format!("failed to build collector: {e}"))?;

    info!(
        chain = %cfg.chain,
        node_url = %cfg.node_url,
        interval_secs = cfg.poll_interval.as_secs(),
        "starting collector"
    );
    tokio::spawn(collector.run());

    shutdown_signal().await;
    info!("shutdown signal received, exiting");
    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install SIGINT handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
