//! Collector library crate.
//!
//! This crate provides the building blocks for a per-chain blockchain node
//! metrics collector:
//!
//! - environment-driven configuration (`config`),
//! - a TTL'd flat-file cache for external facts (`cache`),
//! - node status polling over HTTP/JSON-RPC (`poll`),
//! - per-chain adapters behind one trait (`chains`),
//! - Prometheus text exposition rendering (`render`),
//! - the atomic snapshot hand-off (`snapshot`),
//! - the metrics HTTP server (`server`),
//! - and the poll loop tying them together (`collect`).
//!
//! The `exporter` binary composes these into one long-running process per
//! node.

pub mod cache;
pub mod chains;
pub mod collect;
pub mod config;
pub mod poll;
pub mod render;
pub mod server;
pub mod snapshot;

// Re-export top-level configuration types.
pub use config::{CollectorConfig, ConfigError};

// Re-export the chain plugin surface.
pub use chains::{
    AlgorandAdapter, AvalancheAdapter, ChainAdapter, ChainKind, EthereumAdapter, SolanaAdapter,
    build_adapter,
};

// Re-export the cache and per-cycle status types.
pub use cache::ExternalDataCache;
pub use poll::{IdentityState, NodeClient, NodeStatus, PollError, SyncState};

// Re-export the render/serve/collect surface used by the binary.
pub use collect::Collector;
pub use render::{Metric, MetricKind, build_metrics, render};
pub use server::run_metrics_server;
pub use snapshot::{SnapshotHandle, SnapshotPublisher};
