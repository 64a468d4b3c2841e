//! Error types for RPC provider operations.

use noirforge_core::ConfigError;
use thiserror::Error;

use crate::backoff::is_rate_limited;

/// Boxed error returned by caller-supplied operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure of an RPC provider call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The provider could not be built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every attempt failed.
    #[error("RPC request failed after {attempts} attempt(s) (last endpoint: {endpoint})")]
    Exhausted {
        /// Number of attempts made, including the first
        attempts: u32,
        /// Endpoint used by the final attempt
        endpoint: String,
        /// Error from the final attempt
        #[source]
        source: BoxError,
    },
}

impl RpcError {
    /// Creates an exhausted-retries error.
    pub fn exhausted(attempts: u32, endpoint: impl Into<String>, source: BoxError) -> Self {
        Self::Exhausted { attempts, endpoint: endpoint.into(), source }
    }

    /// Endpoint of the final attempt, if any attempt was made.
    pub fn last_endpoint(&self) -> Option<&str> {
        match self {
            Self::Exhausted { endpoint, .. } => Some(endpoint),
            Self::Config(_) => None,
        }
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Config(_) => 0,
        }
    }

    /// Whether the final attempt failed because of rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Exhausted { source, .. } => is_rate_limited(source),
            Self::Config(_) => false,
        }
    }
}

/// Failure of a single JSON-RPC call on one connection.
#[derive(Debug, Error)]
pub enum RpcCallError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} {reason}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
        /// Response body, truncated
        body: String,
    },

    /// The endpoint returned a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// The response could not be decoded.
    #[error("invalid JSON-RPC response: {0}")]
    Decode(String),
}

impl RpcCallError {
    /// Creates a status error, truncating long bodies.
    pub fn status(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        const MAX_BODY_CHARS: usize = 512;

        let body: String = body.into().chars().take(MAX_BODY_CHARS).collect();
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_names_last_endpoint() {
        let err = RpcError::exhausted(2, "https://b.example.com", "boom".into());

        insta::assert_snapshot!(err.to_string(), @"RPC request failed after 2 attempt(s) (last endpoint: https://b.example.com)");
        assert_eq!(err.last_endpoint(), Some("https://b.example.com"));
        assert_eq!(err.attempts(), 2);
    }

    #[test]
    fn exhausted_wraps_cause() {
        let err = RpcError::exhausted(1, "https://a.example.com", "connection reset".into());
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn status_errors_render_reason_for_classification() {
        let err = RpcCallError::status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.to_string(), "HTTP 429 Too Many Requests: slow down");
        assert!(is_rate_limited(&err));
    }

    #[test]
    fn rate_limited_final_cause_detected() {
        let err = RpcError::exhausted(4, "https://a.example.com", "429 Too Many Requests".into());
        assert!(err.is_rate_limited());

        let err = RpcError::exhausted(4, "https://a.example.com", "timeout".into());
        assert!(!err.is_rate_limited());
    }
}
