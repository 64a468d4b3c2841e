//! Per-attempt connection handles.
//!
//! The provider builds a fresh handle for every attempt because failover
//! changes the endpoint between attempts. The default connector produces
//! JSON-RPC 2.0 connections over HTTP that share one pooled `reqwest` client.

use std::{fmt, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, debug_span, Instrument};

use crate::error::RpcCallError;

/// Confirmation level requested from the RPC endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Latest block seen by the node.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted; will not be rolled back.
    Finalized,
}

impl Commitment {
    /// Wire name sent in request configs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint pair and commitment a connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Request endpoint URL.
    pub endpoint: String,
    /// Paired subscription endpoint URL, if any.
    pub ws_endpoint: Option<String>,
    /// Confirmation level for requests.
    pub commitment: Commitment,
}

/// Builds connection handles for the provider.
pub trait Connector: Send + Sync {
    /// Handle passed to the caller's operation.
    type Connection: Send;

    /// Creates a handle bound to `target`.
    fn connect(&self, target: ConnectionTarget) -> Self::Connection;
}

/// Settings for the HTTP connector's client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: "noirforge-rpc/0.1".to_string() }
    }
}

/// Connector producing [`RpcConnection`]s.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// Creates a connector with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `RpcCallError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, RpcCallError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Creates a connector that reuses an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Connector for HttpConnector {
    type Connection = RpcConnection;

    fn connect(&self, target: ConnectionTarget) -> RpcConnection {
        RpcConnection { target, client: self.client.clone() }
    }
}

/// JSON-RPC connection to one endpoint.
#[derive(Debug, Clone)]
pub struct RpcConnection {
    target: ConnectionTarget,
    client: reqwest::Client,
}

/// Latest blockhash and the last block height it is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    /// Base58 blockhash.
    pub blockhash: String,
    /// Last block height at which the blockhash is accepted.
    pub last_valid_block_height: u64,
}

#[derive(Deserialize)]
struct ContextValue<T> {
    value: T,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl RpcConnection {
    /// Request endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.target.endpoint
    }

    /// Paired websocket endpoint URL.
    pub fn ws_endpoint(&self) -> Option<&str> {
        self.target.ws_endpoint.as_deref()
    }

    /// Commitment used for requests.
    pub fn commitment(&self) -> Commitment {
        self.target.commitment
    }

    /// Sends one JSON-RPC 2.0 request and decodes its `result`.
    ///
    /// # Errors
    ///
    /// - `Transport` when no response arrived
    /// - `Status` for non-2xx responses (429 renders as "Too Many Requests")
    /// - `Rpc` when the response carries an error object
    /// - `Decode` when the result does not match `T`
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcCallError> {
        let span = debug_span!("rpc_request", endpoint = %self.target.endpoint, method);

        async move {
            let payload = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });

            let response = self.client.post(&self.target.endpoint).json(&payload).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RpcCallError::status(status, body));
            }

            let envelope: JsonRpcResponse = response
                .json()
                .await
                .map_err(|e| RpcCallError::decode(format!("malformed envelope: {e}")))?;

            if let Some(error) = envelope.error {
                return Err(RpcCallError::Rpc { code: error.code, message: error.message });
            }

            let result = envelope.result.unwrap_or(Value::Null);
            debug!("JSON-RPC request succeeded");
            serde_json::from_value(result).map_err(|e| RpcCallError::decode(e.to_string()))
        }
        .instrument(span)
        .await
    }

    /// Current slot at the connection's commitment.
    pub async fn get_slot(&self) -> Result<u64, RpcCallError> {
        self.request("getSlot", json!([{ "commitment": self.commitment() }])).await
    }

    /// Latest blockhash at the connection's commitment.
    pub async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, RpcCallError> {
        let response: ContextValue<LatestBlockhash> = self
            .request("getLatestBlockhash", json!([{ "commitment": self.commitment() }]))
            .await?;
        Ok(response.value)
    }
}
