//! Per-chain adapters.
//!
//! The collector itself is chain-agnostic; everything chain-specific lives
//! behind the [`ChainAdapter`] trait:
//!
//! - which endpoints to hit and how to parse them,
//! - the chain's own sync policy (`catchup-time == 0` for Algorand,
//!   bounded slot lag for Solana, P-chain bootstrap for Avalanche,
//!   `eth_syncing == false` for Ethereum),
//! - the metric name prefix and the upstream repository used for the
//!   latest-release lookup.
//!
//! These policies are deliberately not unified: they reflect real
//! differences in what each chain's API exposes.

pub mod algorand;
pub mod avalanche;
pub mod ethereum;
pub mod solana;

use std::fmt;

use async_trait::async_trait;

pub use algorand::AlgorandAdapter;
pub use avalanche::AvalancheAdapter;
pub use ethereum::EthereumAdapter;
pub use solana::SolanaAdapter;

use crate::cache::ExternalDataCache;
use crate::config::CollectorConfig;
use crate::poll::{IdentityState, PollError, SyncState};

/// The chains this collector knows how to poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainKind {
    Algorand,
    Avalanche,
    Ethereum,
    Solana,
}

impl ChainKind {
    /// Parses a chain name as it appears in the `CHAIN` variable.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "algorand" => Some(ChainKind::Algorand),
            "avalanche" => Some(ChainKind::Avalanche),
            "ethereum" => Some(ChainKind::Ethereum),
            "solana" => Some(ChainKind::Solana),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Algorand => "algorand",
            ChainKind::Avalanche => "avalanche",
            ChainKind::Ethereum => "ethereum",
            ChainKind::Solana => "solana",
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain-specific polling interface.
///
/// Sub-polls are independent and failure-isolated: the collector maps each
/// `Err` to the documented sentinel without aborting the cycle. None of
/// these methods retry; the next interval is the retry.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Prefix for every metric name this adapter produces, e.g. `"solana"`.
    fn metric_prefix(&self) -> &'static str;

    /// `owner/repo` slug used for the latest-release lookup.
    fn release_repo(&self) -> &'static str;

    /// Liveness probe with a short timeout; true only on a success
    /// response. Never retried within a cycle.
    async fn poll_health(&self) -> bool;

    /// Reads the node's own height and catch-up signal. Chains whose node
    /// exposes no peer comparison consult the external data cache for the
    /// network-wide height.
    async fn poll_sync_state(&self, cache: &mut ExternalDataCache) -> Result<SyncState, PollError>;

    /// Validator/participant state. `Ok(None)` means the chain exposes no
    /// identity view (Ethereum); no network call is made and the result
    /// says nothing about whether the node is reachable.
    async fn poll_identity_state(&self) -> Result<Option<IdentityState>, PollError>;

    /// Node software version string. `Ok(None)` carries the same
    /// not-exposed meaning as for identity.
    async fn poll_version(&self) -> Result<Option<String>, PollError>;

    /// Connected peer count. `Ok(None)` means the chain exposes no peer
    /// view (algod), again without touching the node.
    async fn poll_peer_count(&self) -> Result<Option<u64>, PollError>;
}

/// Constructs the adapter selected by `cfg.chain`.
pub fn build_adapter(cfg: &CollectorConfig) -> Result<Box<dyn ChainAdapter>, PollError> {
    let adapter: Box<dyn ChainAdapter> = match cfg.chain {
        ChainKind::Algorand => Box::new(AlgorandAdapter::new(cfg)?),
        ChainKind::Avalanche => Box::new(AvalancheAdapter::new(cfg)?),
        ChainKind::Ethereum => Box::new(EthereumAdapter::new(cfg)?),
        ChainKind::Solana => Box::new(SolanaAdapter::new(cfg)?),
    };
    Ok(adapter)
}
