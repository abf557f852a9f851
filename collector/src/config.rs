//! Collector configuration.
//!
//! Configuration is environment-variable driven, matching how the
//! collector is deployed (one process per node, configured by its unit
//! file). Recognized variables:
//!
//! - `CHAIN`: which adapter to run (`algorand|avalanche|ethereum|solana`).
//! - `NODE_URL`: base URL of the local node API.
//! - `NODE_API_TOKEN`: optional auth token for the node API.
//! - `NETWORK_RPC_URL`: optional public RPC used for network height.
//! - `DATA_DIR`: directory for the cache file and snapshot file.
//! - `LISTEN_PORT`: TCP port for the metrics HTTP server.
//! - `POLL_INTERVAL_SECS`: poll loop interval.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::chains::ChainKind;

/// Top-level configuration for one collector process.
#[derive(Clone, Debug)]
pub struct CollectorConfig {
    /// Which chain adapter to run.
    pub chain: ChainKind,
    /// Base URL of the local node's API, e.g. `"http://127.0.0.1:8545"`.
    pub node_url: String,
    /// Optional auth token for the node API (algod's `X-Algo-API-Token`).
    pub node_api_token: Option<String>,
    /// Public RPC endpoint used for the network-wide height comparison on
    /// chains whose node exposes no peer view. `None` uses the adapter's
    /// built-in default.
    pub network_rpc_url: Option<String>,
    /// Directory holding the external data cache and the snapshot file.
    pub data_dir: PathBuf,
    /// Address the metrics HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Poll loop interval.
    pub poll_interval: Duration,
    /// TTL for cached external facts (release versions).
    pub cache_ttl: Duration,
    /// Timeout for the node liveness probe.
    pub health_timeout: Duration,
    /// Timeout for status reads and external fetches.
    pub fetch_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        let addr: SocketAddr = "0.0.0.0:9090"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            chain: ChainKind::Ethereum,
            node_url: "http://127.0.0.1:8545".to_string(),
            node_api_token: None,
            network_rpc_url: None,
            data_dir: PathBuf::from("data/collector"),
            listen_addr: addr,
            poll_interval: Duration::from_secs(15),
            cache_ttl: Duration::from_secs(300),
            health_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Errors while reading configuration from the environment.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is unset.
    Missing(&'static str),
    /// A variable is set but could not be parsed.
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing required environment variable {key}"),
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value {value:?} for environment variable {key}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl CollectorConfig {
    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// Split out from [`from_env`](Self::from_env) so tests can feed a map
    /// instead of mutating process-global environment state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut cfg = Self::default();

        let chain = lookup("CHAIN").ok_or(ConfigError::Missing("CHAIN"))?;
        cfg.chain = ChainKind::parse(&chain).ok_or(ConfigError::Invalid {
            key: "CHAIN",
            value: chain,
        })?;

        cfg.node_url = lookup("NODE_URL").ok_or(ConfigError::Missing("NODE_URL"))?;
        cfg.node_api_token = lookup("NODE_API_TOKEN");
        cfg.network_rpc_url = lookup("NETWORK_RPC_URL");

        if let Some(dir) = lookup("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("LISTEN_PORT") {
            let parsed: u16 = port.parse().map_err(|_| ConfigError::Invalid {
                key: "LISTEN_PORT",
                value: port,
            })?;
            cfg.listen_addr = SocketAddr::new(cfg.listen_addr.ip(), parsed);
        }
        if let Some(secs) = lookup("POLL_INTERVAL_SECS") {
            let parsed: u64 = secs.parse().map_err(|_| ConfigError::Invalid {
                key: "POLL_INTERVAL_SECS",
                value: secs,
            })?;
            cfg.poll_interval = Duration::from_secs(parsed.max(1));
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(
        vars: &'a [(&'static str, &'a str)],
    ) -> impl Fn(&'static str) -> Option<String> + 'a {
        let map: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_configuration_uses_defaults() {
        let cfg = CollectorConfig::from_lookup(lookup_from(&[
            ("CHAIN", "solana"),
            ("NODE_URL", "http://127.0.0.1:8899"),
        ]))
        .unwrap();
        assert_eq!(cfg.chain, ChainKind::Solana);
        assert_eq!(cfg.node_url, "http://127.0.0.1:8899");
        assert_eq!(cfg.poll_interval, Duration::from_secs(15));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));
        assert_eq!(cfg.listen_addr.port(), 9090);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = CollectorConfig::from_lookup(lookup_from(&[
            ("CHAIN", "algorand"),
            ("NODE_URL", "http://127.0.0.1:8080"),
            ("NODE_API_TOKEN", "aaaa"),
            ("LISTEN_PORT", "9201"),
            ("POLL_INTERVAL_SECS", "30"),
            ("DATA_DIR", "/var/lib/collector"),
        ]))
        .unwrap();
        assert_eq!(cfg.chain, ChainKind::Algorand);
        assert_eq!(cfg.node_api_token.as_deref(), Some("aaaa"));
        assert_eq!(cfg.listen_addr.port(), 9201);
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/collector"));
    }

    #[test]
    fn missing_chain_is_an_error() {
        let err =
            CollectorConfig::from_lookup(lookup_from(&[("NODE_URL", "http://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CHAIN")));
    }

    #[test]
    fn unknown_chain_is_an_error() {
        let err = CollectorConfig::from_lookup(lookup_from(&[
            ("CHAIN", "dogecoin"),
            ("NODE_URL", "http://x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CHAIN", .. }));
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = CollectorConfig::from_lookup(lookup_from(&[
            ("CHAIN", "ethereum"),
            ("NODE_URL", "http://x"),
            ("LISTEN_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "LISTEN_PORT", .. }));
    }
}
