//! Solana adapter.
//!
//! Talks to the validator's JSON-RPC endpoint:
//!
//! - `getHealth` for liveness,
//! - `getSlot` for the node's own slot,
//! - `getVersion` for the software version,
//! - `getIdentity` + `getVoteAccounts` for validator state,
//! - `getClusterNodes` for the gossip peer count.
//!
//! The validator has no catch-up signal of its own, so the network-wide
//! slot comes from a public RPC endpoint through the external data cache.
//! The node counts as caught up while it trails the network by at most
//! [`SLOT_LAG_THRESHOLD`] slots.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::cache::ExternalDataCache;
use crate::chains::ChainAdapter;
use crate::config::CollectorConfig;
use crate::poll::{IdentityState, NodeClient, PollError, SyncState};

/// Slots behind the network at which the node is still considered synced.
const SLOT_LAG_THRESHOLD: u64 = 100;

/// The network-wide slot moves fast; cache it for much less than the
/// release-version TTL.
const NETWORK_SLOT_TTL: Duration = Duration::from_secs(60);

const DEFAULT_NETWORK_RPC: &str = "https://api.mainnet-beta.solana.com";

pub struct SolanaAdapter {
    client: NodeClient,
    network: NodeClient,
    health_timeout: Duration,
    fetch_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "solana-core")]
    solana_core: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    identity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoteAccountsResponse {
    #[serde(default)]
    current: Vec<VoteAccount>,
    #[serde(default)]
    delinquent: Vec<VoteAccount>,
}

#[derive(Debug, Deserialize)]
struct VoteAccount {
    #[serde(rename = "nodePubkey")]
    node_pubkey: String,
    #[serde(rename = "activatedStake")]
    activated_stake: Option<u64>,
}

impl SolanaAdapter {
    pub fn new(cfg: &CollectorConfig) -> Result<Self, PollError> {
        let client = NodeClient::new(cfg.node_url.clone())?;
        let network_url = cfg
            .network_rpc_url
            .clone()
            .unwrap_or_else(|| DEFAULT_NETWORK_RPC.to_string());
        let network = NodeClient::new(network_url)?;
        Ok(Self {
            client,
            network,
            health_timeout: cfg.health_timeout,
            fetch_timeout: cfg.fetch_timeout,
        })
    }
}

/// Combines the node's own slot with the cached network slot.
///
/// A missing or unparsable network slot falls back to the local slot, so
/// lag reads as zero rather than as a spurious huge number.
fn sync_from_slots(local_slot: u64, network_slot_raw: &str) -> SyncState {
    let mut network = network_slot_raw.parse::<u64>().unwrap_or(0);
    if network == 0 {
        network = local_slot;
    }
    let behind = network.saturating_sub(local_slot);
    SyncState {
        local_height: local_slot,
        network_height: network,
        caught_up: behind <= SLOT_LAG_THRESHOLD,
    }
}

fn identity_from_vote_accounts(identity: &str, accounts: &VoteAccountsResponse) -> IdentityState {
    if let Some(acc) = accounts.current.iter().find(|a| a.node_pubkey == identity) {
        return IdentityState {
            is_validator: true,
            stake: acc.activated_stake.unwrap_or(0) as f64,
            delinquent: false,
        };
    }
    if let Some(acc) = accounts
        .delinquent
        .iter()
        .find(|a| a.node_pubkey == identity)
    {
        return IdentityState {
            is_validator: true,
            stake: acc.activated_stake.unwrap_or(0) as f64,
            delinquent: true,
        };
    }
    IdentityState::default()
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn metric_prefix(&self) -> &'static str {
        "solana"
    }

    fn release_repo(&self) -> &'static str {
        "solana-labs/solana"
    }

    async fn poll_health(&self) -> bool {
        matches!(
            self.client
                .rpc::<String>("/", "getHealth", json!([]), self.health_timeout)
                .await,
            Ok(s) if s == "ok"
        )
    }

    async fn poll_sync_state(&self, cache: &mut ExternalDataCache) -> Result<SyncState, PollError> {
        let local_slot: u64 = self
            .client
            .rpc("/", "getSlot", json!([]), self.fetch_timeout)
            .await?;

        let network = self.network.clone();
        let timeout = self.fetch_timeout;
        let network_slot = cache
            .get_or_refresh("solana_network_slot", NETWORK_SLOT_TTL, move || async move {
                network
                    .rpc::<u64>("/", "getSlot", json!([]), timeout)
                    .await
                    .map(|slot| slot.to_string())
            })
            .await;

        Ok(sync_from_slots(local_slot, &network_slot))
    }

    async fn poll_identity_state(&self) -> Result<Option<IdentityState>, PollError> {
        let identity: IdentityResponse = self
            .client
            .rpc("/", "getIdentity", json!([]), self.fetch_timeout)
            .await?;
        let Some(pubkey) = identity.identity else {
            return Ok(Some(IdentityState::default()));
        };
        let accounts: VoteAccountsResponse = self
            .client
            .rpc("/", "getVoteAccounts", json!([]), self.fetch_timeout)
            .await?;
        Ok(Some(identity_from_vote_accounts(&pubkey, &accounts)))
    }

    async fn poll_version(&self) -> Result<Option<String>, PollError> {
        let version: VersionResponse = self
            .client
            .rpc("/", "getVersion", json!([]), self.fetch_timeout)
            .await?;
        Ok(version.solana_core)
    }

    async fn poll_peer_count(&self) -> Result<Option<u64>, PollError> {
        let nodes: Vec<serde_json::Value> = self
            .client
            .rpc("/", "getClusterNodes", json!([]), self.fetch_timeout)
            .await?;
        Ok(Some(nodes.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_lag_counts_as_synced() {
        let sync = sync_from_slots(250_000_050, "250000100");
        assert_eq!(sync.behind(), 50);
        assert!(sync.caught_up);
    }

    #[test]
    fn lag_over_threshold_is_not_synced() {
        let sync = sync_from_slots(250_000_000, "250000101");
        assert_eq!(sync.behind(), 101);
        assert!(!sync.caught_up);
    }

    #[test]
    fn unknown_network_slot_falls_back_to_local() {
        let sync = sync_from_slots(42, "unknown");
        assert_eq!(sync.network_height, 42);
        assert_eq!(sync.behind(), 0);
        assert!(sync.caught_up);
    }

    #[test]
    fn local_ahead_of_cached_network_clamps_to_zero() {
        let sync = sync_from_slots(1000, "900");
        assert_eq!(sync.behind(), 0);
        assert!(sync.caught_up);
    }

    #[test]
    fn current_vote_account_is_a_validator() {
        let accounts: VoteAccountsResponse = serde_json::from_str(
            r#"{
                "current": [{"nodePubkey": "me", "activatedStake": 5000000000, "votePubkey": "v"}],
                "delinquent": []
            }"#,
        )
        .unwrap();
        let id = identity_from_vote_accounts("me", &accounts);
        assert!(id.is_validator);
        assert!(!id.delinquent);
        assert_eq!(id.stake, 5_000_000_000.0);
    }

    #[test]
    fn delinquent_list_sets_the_flag() {
        let accounts: VoteAccountsResponse = serde_json::from_str(
            r#"{"current": [], "delinquent": [{"nodePubkey": "me", "activatedStake": 7}]}"#,
        )
        .unwrap();
        let id = identity_from_vote_accounts("me", &accounts);
        assert!(id.is_validator);
        assert!(id.delinquent);
    }

    #[test]
    fn absent_identity_is_not_a_validator() {
        let accounts: VoteAccountsResponse =
            serde_json::from_str(r#"{"current": [], "delinquent": []}"#).unwrap();
        let id = identity_from_vote_accounts("me", &accounts);
        assert!(!id.is_validator);
        assert_eq!(id.stake, 0.0);
        assert!(!id.delinquent);
    }
}
