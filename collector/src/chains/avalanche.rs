//! Avalanche (avalanchego) adapter.
//!
//! Talks to avalanchego's JSON-RPC surfaces:
//!
//! - `health.health` on `/ext/health` for liveness,
//! - `info.isBootstrapped` on `/ext/info` for the P-chain bootstrap state,
//! - `platform.getHeight` on `/ext/bc/P` for the node's P-chain height,
//! - `info.getNodeVersion`, `info.getNodeID`, `info.peers` on `/ext/info`,
//! - `platform.getCurrentValidators` for validator-set membership.
//!
//! avalanchego encodes numbers as JSON strings; parse failures default to
//! zero. The sync policy is the bootstrap flag: a bootstrapped P-chain
//! means zero backlog, and the network height is taken as the node's own.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::cache::ExternalDataCache;
use crate::chains::ChainAdapter;
use crate::config::CollectorConfig;
use crate::poll::{IdentityState, NodeClient, PollError, SyncState};

pub struct AvalancheAdapter {
    client: NodeClient,
    health_timeout: Duration,
    fetch_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    healthy: bool,
}

#[derive(Debug, Deserialize)]
struct BootstrappedResponse {
    #[serde(rename = "isBootstrapped")]
    is_bootstrapped: bool,
}

#[derive(Debug, Deserialize)]
struct HeightResponse {
    height: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeVersionResponse {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeIdResponse {
    #[serde(rename = "nodeID")]
    node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PeersResponse {
    #[serde(rename = "numPeers")]
    num_peers: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentValidatorsResponse {
    #[serde(default)]
    validators: Vec<Validator>,
}

#[derive(Debug, Deserialize)]
struct Validator {
    #[serde(rename = "nodeID")]
    node_id: String,
    #[serde(rename = "stakeAmount")]
    stake_amount: Option<String>,
}

impl AvalancheAdapter {
    pub fn new(cfg: &CollectorConfig) -> Result<Self, PollError> {
        Ok(Self {
            client: NodeClient::new(cfg.node_url.clone())?,
            health_timeout: cfg.health_timeout,
            fetch_timeout: cfg.fetch_timeout,
        })
    }
}

/// avalanchego serializes numeric values as strings.
fn parse_string_number(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse::<u64>().ok()).unwrap_or(0)
}

fn identity_from_validators(node_id: &str, resp: &CurrentValidatorsResponse) -> IdentityState {
    match resp.validators.iter().find(|v| v.node_id == node_id) {
        Some(v) => IdentityState {
            is_validator: true,
            stake: parse_string_number(v.stake_amount.as_deref()) as f64,
            delinquent: false,
        },
        None => IdentityState::default(),
    }
}

#[async_trait]
impl ChainAdapter for AvalancheAdapter {
    fn metric_prefix(&self) -> &'static str {
        "avalanche"
    }

    fn release_repo(&self) -> &'static str {
        "ava-labs/avalanchego"
    }

    async fn poll_health(&self) -> bool {
        matches!(
            self.client
                .rpc::<HealthResponse>("/ext/health", "health.health", json!({}), self.health_timeout)
                .await,
            Ok(h) if h.healthy
        )
    }

    async fn poll_sync_state(&self, _cache: &mut ExternalDataCache) -> Result<SyncState, PollError> {
        let height: HeightResponse = self
            .client
            .rpc("/ext/bc/P", "platform.getHeight", json!({}), self.fetch_timeout)
            .await?;
        let local = parse_string_number(height.height.as_deref());

        // Bootstrap state is a separate, failure-isolated read: if it
        // cannot be determined the node counts as not caught up.
        let bootstrapped = matches!(
            self.client
                .rpc::<BootstrappedResponse>(
                    "/ext/info",
                    "info.isBootstrapped",
                    json!({"chain": "P"}),
                    self.fetch_timeout,
                )
                .await,
            Ok(b) if b.is_bootstrapped
        );

        Ok(SyncState {
            local_height: local,
            network_height: local,
            caught_up: bootstrapped,
        })
    }

    async fn poll_identity_state(&self) -> Result<Option<IdentityState>, PollError> {
        let id: NodeIdResponse = self
            .client
            .rpc("/ext/info", "info.getNodeID", json!({}), self.fetch_timeout)
            .await?;
        let Some(node_id) = id.node_id else {
            return Ok(Some(IdentityState::default()));
        };
        let validators: CurrentValidatorsResponse = self
            .client
            .rpc(
                "/ext/bc/P",
                "platform.getCurrentValidators",
                json!({}),
                self.fetch_timeout,
            )
            .await?;
        Ok(Some(identity_from_validators(&node_id, &validators)))
    }

    async fn poll_version(&self) -> Result<Option<String>, PollError> {
        let version: NodeVersionResponse = self
            .client
            .rpc("/ext/info", "info.getNodeVersion", json!({}), self.fetch_timeout)
            .await?;
        Ok(version.version)
    }

    async fn poll_peer_count(&self) -> Result<Option<u64>, PollError> {
        let peers: PeersResponse = self
            .client
            .rpc("/ext/info", "info.peers", json!({}), self.fetch_timeout)
            .await?;
        Ok(Some(parse_string_number(peers.num_peers.as_deref())))
    }
}
