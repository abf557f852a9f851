//! Prometheus text exposition rendering.
//!
//! [`build_metrics`] maps one poll cycle's results onto the fixed metric
//! set, and [`render`] formats it as exposition text (`# HELP`, `# TYPE`,
//! sample lines). Metric order is fixed so rendering the same inputs twice
//! yields byte-identical output.
//!
//! The renderer never emits an empty or non-finite value: a malformed
//! sample would fail the entire scrape on the Prometheus side, which is a
//! far worse failure mode than a sentinel zero.

use crate::cache::UNKNOWN;
use crate::poll::NodeStatus;

/// Metric types used by this collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// One sample line: optional labels plus a value.
#[derive(Clone, Debug)]
pub struct Sample {
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

/// One metric family: name, help, type, and its samples.
#[derive(Clone, Debug)]
pub struct Metric {
    pub name: String,
    pub help: &'static str,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

impl Metric {
    fn gauge(name: String, help: &'static str, value: f64) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Gauge,
            samples: vec![Sample {
                labels: Vec::new(),
                value,
            }],
        }
    }

    /// Info pattern: the fact rides in a label, the value is fixed at 1,
    /// so an upgrade shows up as a new time series rather than a changed
    /// value.
    fn info(name: String, help: &'static str, label: &'static str, fact: String) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Gauge,
            samples: vec![Sample {
                labels: vec![(label, fact)],
                value: 1.0,
            }],
        }
    }
}

fn bool_gauge(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Builds the full metric set for one cycle, in its fixed order.
///
/// Every declared metric appears exactly once; missing optional fields are
/// substituted with the zero/unknown sentinel rather than omitted.
pub fn build_metrics(
    prefix: &str,
    status: &NodeStatus,
    latest_release: &str,
    polled_at: u64,
) -> Vec<Metric> {
    let name = |suffix: &str| format!("{prefix}_{suffix}");
    let version = status.version.clone().unwrap_or_else(|| UNKNOWN.to_string());
    let release = if latest_release.is_empty() {
        UNKNOWN.to_string()
    } else {
        latest_release.to_string()
    };

    vec![
        Metric::gauge(
            name("node_healthy"),
            "Whether the node's liveness endpoint answered successfully (1) or not (0).",
            bool_gauge(status.healthy),
        ),
        Metric::gauge(
            name("node_synced"),
            "Whether the node is healthy and reports zero catch-up backlog (1) or not (0).",
            bool_gauge(status.is_synced()),
        ),
        Metric::gauge(
            name("block_height"),
            "Height/slot/round the node reports for itself.",
            status.sync.local_height as f64,
        ),
        Metric::gauge(
            name("network_block_height"),
            "Best known network-wide height/slot/round.",
            status.sync.network_height as f64,
        ),
        Metric::gauge(
            name("blocks_behind"),
            "How far the node trails the network, clamped at zero.",
            status.sync.behind() as f64,
        ),
        Metric::gauge(
            name("peer_count"),
            "Connected peers reported by the node (0 when not exposed).",
            status.peer_count.unwrap_or(0) as f64,
        ),
        Metric::gauge(
            name("is_validator"),
            "Whether the node's own key appears in the current validator set (1) or not (0).",
            bool_gauge(status.identity.is_validator),
        ),
        Metric::gauge(
            name("active_stake"),
            "Stake attributed to the node, in the chain's native base unit.",
            status.identity.stake,
        ),
        Metric::gauge(
            name("validator_delinquent"),
            "Whether the chain explicitly reports the node delinquent (1) or not (0).",
            bool_gauge(status.identity.delinquent),
        ),
        Metric::info(
            name("node_info"),
            "Node software version as reported by the node.",
            "version",
            version,
        ),
        Metric::info(
            name("latest_release_info"),
            "Latest upstream release version from the external data cache.",
            "version",
            release,
        ),
        Metric::gauge(
            name("scrape_success"),
            "Whether this poll cycle reached the node at all (1) or not (0).",
            bool_gauge(status.reachable),
        ),
        Metric::gauge(
            name("last_poll_timestamp_seconds"),
            "Unix timestamp of the poll cycle that produced this snapshot.",
            polled_at as f64,
        ),
    ]
}

/// Formats metric families as Prometheus text exposition.
pub fn render(metrics: &[Metric]) -> String {
    let mut out = String::new();
    for metric in metrics {
        out.push_str(&format!("# HELP {} {}\n", metric.name, metric.help));
        out.push_str(&format!("# TYPE {} {}\n", metric.name, metric.kind.as_str()));
        for sample in &metric.samples {
            out.push_str(&metric.name);
            if !sample.labels.is_empty() {
                out.push('{');
                for (i, (key, value)) in sample.labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("{key}=\"{}\"", escape_label_value(value)));
                }
                out.push('}');
            }
            out.push(' ');
            out.push_str(&format_value(sample.value));
            out.push('\n');
        }
    }
    out
}

/// Formats a sample value, mapping non-finite inputs to 0.
fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        "0".to_string()
    }
}

/// Escapes a label value per the exposition format rules.
fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
