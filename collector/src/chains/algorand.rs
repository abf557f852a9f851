//! Algorand (algod) adapter.
//!
//! Talks to algod's REST API:
//!
//! - `GET /health` for liveness,
//! - `GET /v2/status` for the current round and catch-up signal,
//! - `GET /versions` for the build version,
//! - `GET /v2/participation` for registered participation keys.
//!
//! Algorand's sync policy is its own catch-up signal: the node is caught
//! up exactly when `catchup-time == 0`. algod exposes no peer comparison,
//! so the network height is taken to be the node's own round.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::ExternalDataCache;
use crate::chains::ChainAdapter;
use crate::config::CollectorConfig;
use crate::poll::{IdentityState, NodeClient, PollError, SyncState};

pub struct AlgorandAdapter {
    client: NodeClient,
    health_timeout: Duration,
    fetch_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "last-round")]
    last_round: Option<u64>,
    #[serde(rename = "catchup-time")]
    catchup_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    build: Option<BuildVersion>,
}

#[derive(Debug, Deserialize)]
struct BuildVersion {
    major: Option<u64>,
    minor: Option<u64>,
    build_number: Option<u64>,
}

impl AlgorandAdapter {
    pub fn new(cfg: &CollectorConfig) -> Result<Self, PollError> {
        let mut client = NodeClient::new(cfg.node_url.clone())?;
        if let Some(token) = &cfg.node_api_token {
            client = client.with_auth_header("X-Algo-API-Token", token.clone());
        }
        Ok(Self {
            client,
            health_timeout: cfg.health_timeout,
            fetch_timeout: cfg.fetch_timeout,
        })
    }
}

fn sync_from_status(status: &StatusResponse) -> SyncState {
    let local = status.last_round.unwrap_or(0);
    let catchup = status.catchup_time.unwrap_or(0);
    SyncState {
        local_height: local,
        network_height: local,
        caught_up: catchup == 0,
    }
}

fn version_from_build(resp: &VersionsResponse) -> Option<String> {
    let build = resp.build.as_ref()?;
    Some(format!(
        "{}.{}.{}",
        build.major.unwrap_or(0),
        build.minor.unwrap_or(0),
        build.build_number.unwrap_or(0)
    ))
}

#[async_trait]
impl ChainAdapter for AlgorandAdapter {
    fn metric_prefix(&self) -> &'static str {
        "algorand"
    }

    fn release_repo(&self) -> &'static str {
        "algorand/go-algorand"
    }

    async fn poll_health(&self) -> bool {
        self.client.get_ok("/health", self.health_timeout).await.is_ok()
    }

    async fn poll_sync_state(&self, _cache: &mut ExternalDataCache) -> Result<SyncState, PollError> {
        let status: StatusResponse = self
            .client
            .get_json("/v2/status", self.fetch_timeout)
            .await?;
        Ok(sync_from_status(&status))
    }

    async fn poll_identity_state(&self) -> Result<Option<IdentityState>, PollError> {
        // Registered participation keys mean the node takes part in
        // consensus. algod reports no stake or delinquency view here.
        let keys: Vec<serde_json::Value> = self
            .client
            .get_json("/v2/participation", self.fetch_timeout)
            .await?;
        Ok(Some(IdentityState {
            is_validator: !keys.is_empty(),
            stake: 0.0,
            delinquent: false,
        }))
    }

    async fn poll_version(&self) -> Result<Option<String>, PollError> {
        let resp: VersionsResponse = self
            .client
            .get_json("/versions", self.fetch_timeout)
            .await?;
        Ok(version_from_build(&resp))
    }

    async fn poll_peer_count(&self) -> Result<Option<u64>, PollError> {
        // algod's REST API exposes no peer count.
        Ok(None)
    }
}
