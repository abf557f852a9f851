//! Node status polling.
//!
//! This module defines the per-cycle status types produced by a chain
//! adapter ([`NodeStatus`], [`SyncState`], [`IdentityState`]) and the
//! HTTP/JSON-RPC client plumbing ([`client::NodeClient`]) the adapters
//! share.
//!
//! Every field here is recomputed from scratch on each poll cycle; nothing
//! is merged with the previous cycle's values. Failures degrade to the
//! documented zero/unknown sentinels instead of aborting the cycle.

pub mod client;

pub use client::{NodeClient, PollError};

/// Sync progress reported by the node, compared against the best known
/// network-wide height.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Height/slot/round the local node reports for itself.
    pub local_height: u64,
    /// Best known network-wide height. For chains that expose no peer
    /// comparison this equals `local_height`.
    pub network_height: u64,
    /// Whether the node reports zero catch-up backlog under its chain's
    /// own policy (e.g. `catchup-time == 0` for Algorand, a bounded slot
    /// lag for Solana).
    pub caught_up: bool,
}

impl SyncState {
    /// How far the node trails the network, clamped at zero.
    pub fn behind(&self) -> u64 {
        self.network_height.saturating_sub(self.local_height)
    }
}

/// Validator/participant identity state, for chains that expose one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentityState {
    /// Whether the node's own key appears in the current validator set.
    pub is_validator: bool,
    /// Stake attributed to the node, in the chain's native base unit.
    pub stake: f64,
    /// True only when the chain API explicitly reports the node delinquent.
    pub delinquent: bool,
}

/// Everything one poll cycle learned about the node.
#[derive(Clone, Debug, Default)]
pub struct NodeStatus {
    /// Liveness endpoint answered with a success status within its timeout.
    pub healthy: bool,
    /// At least one sub-poll reached the node this cycle.
    pub reachable: bool,
    pub sync: SyncState,
    pub identity: IdentityState,
    /// Node software version, when the node reports one.
    pub version: Option<String>,
    /// Connected peer count, when the node exposes one.
    pub peer_count: Option<u64>,
}

impl NodeStatus {
    /// A node is synced only when it is healthy and reports zero backlog.
    /// An unhealthy node is never synced, regardless of any other field.
    pub fn is_synced(&self) -> bool {
        self.healthy && self.sync.caught_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behind_clamps_negative_differences_to_zero() {
        let sync = SyncState {
            local_height: 1500,
            network_height: 1400,
            caught_up: true,
        };
        assert_eq!(sync.behind(), 0);

        let lagging = SyncState {
            local_height: 1400,
            network_height: 1500,
            caught_up: false,
        };
        assert_eq!(lagging.behind(), 100);
    }

    #[test]
    fn healthy_and_caught_up_means_synced() {
        let status = NodeStatus {
            healthy: true,
            sync: SyncState {
                caught_up: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(status.is_synced());
    }

    #[test]
    fn unhealthy_node_is_never_synced() {
        let status = NodeStatus {
            healthy: false,
            sync: SyncState {
                local_height: 10,
                network_height: 10,
                caught_up: true,
            },
            ..Default::default()
        };
        assert!(!status.is_synced());
    }

    #[test]
    fn backlog_blocks_sync_even_when_healthy() {
        let status = NodeStatus {
            healthy: true,
            sync: SyncState {
                caught_up: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!status.is_synced());
    }
}
