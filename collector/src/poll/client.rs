//! Shared HTTP/JSON-RPC client for chain adapters.
//!
//! All four adapters talk to their node through a [`NodeClient`]: plain
//! GET for REST-style APIs (Algorand's algod) and JSON-RPC 2.0 POST for
//! the rest. Timeouts are passed per call because the liveness probe uses
//! a shorter deadline than the status/identity reads.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Errors from a single poll request.
///
/// These are always handled by the caller substituting a sentinel value;
/// they never abort a poll cycle.
#[derive(Debug)]
pub enum PollError {
    /// Transport-level failure (connect error, timeout, TLS).
    Transport(String),
    /// The endpoint answered with a non-success HTTP status.
    Status(u16),
    /// The response body was malformed or missing expected fields.
    Protocol(String),
    /// A JSON-RPC error object was returned.
    Rpc(String),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Transport(msg) => write!(f, "transport error: {msg}"),
            PollError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            PollError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            PollError::Rpc(msg) => write!(f, "rpc error: {msg}"),
        }
    }
}

impl std::error::Error for PollError {}

impl From<reqwest::Error> for PollError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PollError::Protocol(e.to_string())
        } else {
            PollError::Transport(e.to_string())
        }
    }
}

/// HTTP client bound to one node API base URL.
///
/// Cheap to clone; adapters that also consult a public network RPC hold a
/// second instance pointed at that URL.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
    /// Optional auth header applied to every request, e.g.
    /// `("X-Algo-API-Token", token)` for algod.
    auth_header: Option<(&'static str, String)>,
}

impl NodeClient {
    /// Constructs a client for `base_url` (without a trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self, PollError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| PollError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            auth_header: None,
        })
    }

    /// Attaches an auth header sent with every request.
    pub fn with_auth_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.auth_header = Some((name, value.into()));
        self
    }

    fn endpoint(&self, path: &str) -> String {
        // Avoid accidental double slashes.
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_header {
            Some((name, value)) => req.header(*name, value.as_str()),
            None => req,
        }
    }

    /// Liveness probe: true only when the endpoint answers with a success
    /// status within `timeout`. Any error maps to false at the call site.
    pub async fn get_ok(&self, path: &str, timeout: Duration) -> Result<(), PollError> {
        let url = self.endpoint(path);
        let resp = self
            .apply_auth(self.http.get(&url))
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PollError::Status(status.as_u16()))
        }
    }

    /// GET `path` and deserialize the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, PollError> {
        let url = self.endpoint(path);
        let resp = self
            .apply_auth(self.http.get(&url))
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| PollError::Protocol(format!("failed to parse JSON response: {e}")))
    }

    /// JSON-RPC 2.0 call against `path`, returning the `result` field.
    pub async fn rpc<T: DeserializeOwned>(
        &self,
        path: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<T, PollError> {
        let url = self.endpoint(path);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .apply_auth(self.http.post(&url))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        let envelope: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| PollError::Protocol(format!("failed to parse JSON-RPC response: {e}")))?;
        if let Some(err) = envelope.error {
            return Err(PollError::Rpc(format!("{} (code {})", err.message, err.code)));
        }
        envelope
            .result
            .ok_or_else(|| PollError::Protocol("JSON-RPC response missing result".to_string()))
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let client = NodeClient::new("http://127.0.0.1:8545/").unwrap();
        assert_eq!(
            client.endpoint("/ext/info"),
            "http://127.0.0.1:8545/ext/info"
        );
        assert_eq!(client.endpoint("health"), "http://127.0.0.1:8545/health");
    }

    #[test]
    fn rpc_envelope_extracts_result() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":"0x1b4"}"#;
        let resp: RpcResponse<String> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.result.as_deref(), Some("0x1b4"));
        assert!(resp.error.is_none());
    }

    #[test]
    fn rpc_envelope_surfaces_error_object() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#;
        let resp: RpcResponse<String> = serde_json::from_str(json).unwrap();
        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32601);
        assert_eq!(err.message, "method not found");
    }
}
