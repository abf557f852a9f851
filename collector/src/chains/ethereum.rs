//! Ethereum execution-client adapter.
//!
//! Talks to a geth-compatible JSON-RPC endpoint:
//!
//! - `net_version` as the liveness probe (geth has no health route),
//! - `eth_syncing` + `eth_blockNumber` for sync state,
//! - `net_peerCount` for the peer count,
//! - `web3_clientVersion` for the software version.
//!
//! Quantities arrive as 0x-prefixed hex strings; parse failures default to
//! zero. The sync policy is `eth_syncing == false`: while syncing, the
//! reported `currentBlock`/`highestBlock` pair provides the lag.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::cache::ExternalDataCache;
use crate::chains::ChainAdapter;
use crate::config::CollectorConfig;
use crate::poll::{IdentityState, NodeClient, PollError, SyncState};

pub struct EthereumAdapter {
    client: NodeClient,
    health_timeout: Duration,
    fetch_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SyncingProgress {
    #[serde(rename = "currentBlock")]
    current_block: Option<String>,
    #[serde(rename = "highestBlock")]
    highest_block: Option<String>,
}

impl EthereumAdapter {
    pub fn new(cfg: &CollectorConfig) -> Result<Self, PollError> {
        Ok(Self {
            client: NodeClient::new(cfg.node_url.clone())?,
            health_timeout: cfg.health_timeout,
            fetch_timeout: cfg.fetch_timeout,
        })
    }
}

/// Parses an `0x`-prefixed hex quantity, defaulting to zero.
fn parse_hex_u64(raw: &str) -> u64 {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).unwrap_or(0)
}

/// Interprets the `eth_syncing` result: `false` when in sync, otherwise a
/// progress object.
fn sync_from_rpc(syncing: &Value, latest_block_hex: &str) -> SyncState {
    match syncing {
        Value::Bool(false) => {
            let local = parse_hex_u64(latest_block_hex);
            SyncState {
                local_height: local,
                network_height: local,
                caught_up: true,
            }
        }
        other => {
            let progress: SyncingProgress =
                serde_json::from_value(other.clone()).unwrap_or(SyncingProgress {
                    current_block: None,
                    highest_block: None,
                });
            let local = progress
                .current_block
                .as_deref()
                .map(parse_hex_u64)
                .unwrap_or(0);
            let network = progress
                .highest_block
                .as_deref()
                .map(parse_hex_u64)
                .unwrap_or(local);
            SyncState {
                local_height: local,
                network_height: network.max(local),
                caught_up: false,
            }
        }
    }
}

#[async_trait]
impl ChainAdapter for EthereumAdapter {
    fn metric_prefix(&self) -> &'static str {
        "ethereum"
    }

    fn release_repo(&self) -> &'static str {
        "ethereum/go-ethereum"
    }

    async fn poll_health(&self) -> bool {
        self.client
            .rpc::<String>("/", "net_version", json!([]), self.health_timeout)
            .await
            .is_ok()
    }

    async fn poll_sync_state(&self, _cache: &mut ExternalDataCache) -> Result<SyncState, PollError> {
        let syncing: Value = self
            .client
            .rpc("/", "eth_syncing", json!([]), self.fetch_timeout)
            .await?;

        // Only needed in the in-sync branch, but reading it here keeps the
        // cycle to a fixed pair of calls.
        let latest: String = match self
            .client
            .rpc("/", "eth_blockNumber", json!([]), self.fetch_timeout)
            .await
        {
            Ok(hex) => hex,
            Err(_) => "0x0".to_string(),
        };

        Ok(sync_from_rpc(&syncing, &latest))
    }

    async fn poll_identity_state(&self) -> Result<Option<IdentityState>, PollError> {
        // Execution clients expose no validator identity.
        Ok(None)
    }

    async fn poll_version(&self) -> Result<Option<String>, PollError> {
        let version: String = self
            .client
            .rpc("/", "web3_clientVersion", json!([]), self.fetch_timeout)
            .await?;
        Ok(Some(version))
    }

    async fn poll_peer_count(&self) -> Result<Option<u64>, PollError> {
        let hex: String = self
            .client
            .rpc("/", "net_peerCount", json!([]), self.fetch_timeout)
            .await?;
        Ok(Some(parse_hex_u64(&hex)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_quantities_parse() {
        assert_eq!(parse_hex_u64("0x1b4"), 436);
        assert_eq!(parse_hex_u64("0x0"), 0);
    }

    #[test]
    fn malformed_hex_defaults_to_zero() {
        assert_eq!(parse_hex_u64("0xzz"), 0);
        assert_eq!(parse_hex_u64(""), 0);
    }

    #[test]
    fn syncing_false_means_caught_up() {
        let sync = sync_from_rpc(&Value::Bool(false), "0x112a880");
        assert!(sync.caught_up);
        assert_eq!(sync.local_height, 18_000_000);
        assert_eq!(sync.behind(), 0);
    }

    #[test]
    fn syncing_object_reports_lag() {
        let syncing: Value = serde_json::from_str(
            r#"{"startingBlock": "0x0", "currentBlock": "0x64", "highestBlock": "0xc8"}"#,
        )
        .unwrap();
        let sync = sync_from_rpc(&syncing, "0x64");
        assert!(!sync.caught_up);
        assert_eq!(sync.local_height, 100);
        assert_eq!(sync.network_height, 200);
        assert_eq!(sync.behind(), 100);
    }

    #[test]
    fn malformed_syncing_object_degrades_to_zeroes() {
        let syncing: Value = serde_json::from_str(r#"{"unexpected": true}"#).unwrap();
        let sync = sync_from_rpc(&syncing, "0x10");
        assert!(!sync.caught_up);
        assert_eq!(sync.local_height, 0);
        assert_eq!(sync.behind(), 0);
    }

    #[test]
    fn highest_behind_current_clamps_lag() {
        let syncing: Value =
            serde_json::from_str(r#"{"currentBlock": "0xc8", "highestBlock": "0x64"}"#).unwrap();
        let sync = sync_from_rpc(&syncing, "0xc8");
        assert_eq!(sync.behind(), 0);
    }
}
