//! The poll loop.
//!
//! [`Collector`] owns the chain adapter, the external data cache, and the
//! snapshot publisher. Each interval tick it runs one cycle: poll the node
//! (every sub-poll failure-isolated), consult the cache for the latest
//! upstream release, render the metric set, and publish the snapshot.
//!
//! A cycle can degrade but never abort: even a completely unreachable node
//! yields a snapshot with `node_healthy 0` and `scrape_success 0`, because
//! absent metrics are a worse failure mode for an operator than metrics
//! reporting "down".

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::cache::{ExternalDataCache, unix_now};
use crate::chains::ChainAdapter;
use crate::config::CollectorConfig;
use crate::poll::{IdentityState, NodeStatus, PollError, SyncState};
use crate::render::{build_metrics, render};
use crate::snapshot::SnapshotPublisher;

pub struct Collector {
    adapter: Box<dyn ChainAdapter>,
    cache: ExternalDataCache,
    publisher: SnapshotPublisher,
    http: reqwest::Client,
    poll_interval: Duration,
    cache_ttl: Duration,
}

impl Collector {
    pub fn new(
        adapter: Box<dyn ChainAdapter>,
        cache: ExternalDataCache,
        publisher: SnapshotPublisher,
        cfg: &CollectorConfig,
    ) -> Result<Self, PollError> {
        // The GitHub API rejects requests without a User-Agent.
        let http = reqwest::Client::builder()
            .user_agent("nodepulse-collector")
            .timeout(cfg.fetch_timeout)
            .build()
            .map_err(|e| PollError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            adapter,
            cache,
            publisher,
            http,
            poll_interval: cfg.poll_interval,
            cache_ttl: cfg.cache_ttl,
        })
    }

    /// Runs the poll loop forever. The first tick fires immediately, so a
    /// snapshot exists within one cycle of startup.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            self.cycle().await;
        }
    }

    /// One poll cycle: poll, render, publish.
    async fn cycle(&mut self) {
        let status = self.poll_node().await;
        let release = self.latest_release().await;

        let prefix = self.adapter.metric_prefix();
        let text = render(&build_metrics(prefix, &status, &release, unix_now()));

        match self.publisher.publish(text) {
            Ok(()) => debug!(
                chain = prefix,
                healthy = status.healthy,
                synced = status.is_synced(),
                behind = status.sync.behind(),
                "published snapshot"
            ),
            // Keep serving from memory; the disk copy is best effort.
            Err(e) => error!(chain = prefix, error = %e, "failed to write snapshot file"),
        }
    }

    /// Polls all node state, mapping each sub-poll failure to its sentinel.
    async fn poll_node(&mut self) -> NodeStatus {
        let healthy = self.adapter.poll_health().await;
        let mut reachable = healthy;

        let sync = match self.adapter.poll_sync_state(&mut self.cache).await {
            Ok(sync) => {
                reachable = true;
                sync
            }
            Err(e) => {
                warn!(error = %e, "sync state poll failed");
                SyncState::default()
            }
        };

        // An `Ok(None)` sub-poll means the chain exposes no such view and
        // made no network call, so it must not count as reaching the node.
        let identity = match self.adapter.poll_identity_state().await {
            Ok(Some(identity)) => {
                reachable = true;
                identity
            }
            Ok(None) => IdentityState::default(),
            Err(e) => {
                warn!(error = %e, "identity poll failed");
                IdentityState::default()
            }
        };

        let version = match self.adapter.poll_version().await {
            Ok(Some(version)) => {
                reachable = true;
                Some(version)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "version poll failed");
                None
            }
        };

        let peer_count = match self.adapter.poll_peer_count().await {
            Ok(Some(count)) => {
                reachable = true;
                Some(count)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "peer count poll failed");
                None
            }
        };

        NodeStatus {
            healthy,
            reachable,
            sync,
            identity,
            version,
            peer_count,
        }
    }

    /// Latest upstream release tag through the external data cache.
    ///
    /// The key is namespaced by chain so a data directory reused across
    /// chains never serves another chain's release tag.
    async fn latest_release(&mut self) -> String {
        let http = self.http.clone();
        let repo = self.adapter.release_repo();
        let key = format!("{}_latest_release", self.adapter.metric_prefix());
        self.cache
            .get_or_refresh(&key, self.cache_ttl, move || async move {
                fetch_latest_release(&http, repo).await
            })
            .await
    }
}

#[derive(Deserialize)]
struct ReleaseResponse {
    tag_name: Option<String>,
}

/// Fetches the latest release tag for `owner/repo` from the GitHub API.
async fn fetch_latest_release(http: &reqwest::Client, repo: &str) -> Result<String, PollError> {
    let url = format!("https://api.github.com/repos/{repo}/releases/latest");
    let resp = http.get(&url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PollError::Status(status.as_u16()));
    }
    let release: ReleaseResponse = resp
        .json()
        .await
        .map_err(|e| PollError::Protocol(format!("failed to parse release response: {e}")))?;
    release
        .tag_name
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| PollError::Protocol("release response missing tag_name".to_string()))
}
