//! RPC provider: retries a caller's operation across the endpoint pool.

use std::{future::Future, sync::Arc, time::Duration};

use noirforge_core::{Clock, RealClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    backoff::{is_rate_limited, BackoffPolicy},
    connection::{ClientConfig, Commitment, Connector, HttpConnector},
    error::{BoxError, RpcError},
    pool::EndpointPool,
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_RATE_LIMIT_DELAY_MS,
};

/// Provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcProviderConfig {
    /// Request endpoints in failover order; must not be empty.
    pub endpoints: Vec<String>,
    /// Optional subscription endpoints (same length as `endpoints`, or one).
    #[serde(default)]
    pub ws_endpoints: Option<Vec<String>>,
    /// Confirmation level for requests.
    #[serde(default)]
    pub commitment: Commitment,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Minimum delay after a rate-limited failure, in milliseconds.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

impl RpcProviderConfig {
    /// Config for `endpoints` with every other setting at its default.
    pub fn new(endpoints: impl IntoIterator<Item = String>) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
            ws_endpoints: None,
            commitment: Commitment::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            rate_limit_delay_ms: DEFAULT_RATE_LIMIT_DELAY_MS,
        }
    }

    /// Sets the websocket endpoints.
    #[must_use]
    pub fn with_ws_endpoints(mut self, ws_endpoints: Option<Vec<String>>) -> Self {
        self.ws_endpoints = ws_endpoints;
        self
    }

    /// Backoff policy described by this config.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay_ms),
        }
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_rate_limit_delay_ms() -> u64 {
    DEFAULT_RATE_LIMIT_DELAY_MS
}

/// Failover RPC client.
///
/// Sharing one provider between tasks shares its pool cursor, so a failover
/// triggered by one call moves every later call to the next endpoint too.
#[derive(Debug)]
pub struct RpcProvider<C = HttpConnector> {
    pool: EndpointPool,
    policy: BackoffPolicy,
    commitment: Commitment,
    max_retries: u32,
    connector: C,
    clock: Arc<dyn Clock>,
}

impl RpcProvider<HttpConnector> {
    /// Creates a provider issuing JSON-RPC over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` if `config.endpoints` is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: RpcProviderConfig) -> Result<Self, RpcError> {
        let connector = HttpConnector::new(&ClientConfig::default()).map_err(|e| {
            noirforge_core::ConfigError::invalid(format!("failed to build HTTP client: {e}"))
        })?;
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> RpcProvider<C> {
    /// Creates a provider using a custom connector.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Config` if `config.endpoints` is empty.
    pub fn with_connector(config: RpcProviderConfig, connector: C) -> Result<Self, RpcError> {
        let policy = config.backoff_policy();
        let pool = EndpointPool::new(config.endpoints, config.ws_endpoints)?;

        Ok(Self {
            pool,
            policy,
            commitment: config.commitment,
            max_retries: config.max_retries,
            connector,
            clock: RealClock::shared(),
        })
    }

    /// Replaces the clock used for backoff sleeps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Endpoint pool backing this provider.
    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Current request endpoint.
    pub fn current_endpoint(&self) -> &str {
        self.pool.current()
    }

    /// Websocket endpoint paired with the current request endpoint.
    pub fn current_ws_endpoint(&self) -> Option<&str> {
        self.pool.current_ws()
    }

    /// Runs `op` against a fresh connection, retrying across the pool.
    ///
    /// `op` runs once per attempt, up to `max_retries + 1` times, so it should
    /// be safe to repeat. After each failure the pool advances to the next
    /// endpoint and the call sleeps for the backoff delay (escalated when the
    /// error looks like a rate limit).
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Exhausted` naming the last endpoint and wrapping the
    /// last error once every attempt has failed.
    pub async fn with_connection<T, E, F, Fut>(&self, mut op: F) -> Result<T, RpcError>
    where
        F: FnMut(C::Connection) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let mut attempt: u32 = 0;

        loop {
            let target = self.pool.target(self.commitment);
            let endpoint = target.endpoint.clone();
            let connection = self.connector.connect(target);

            let error: BoxError = match op(connection).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, endpoint = %endpoint, "RPC request succeeded after retry");
                    }
                    return Ok(value);
                },
                Err(e) => e.into(),
            };

            if attempt >= self.max_retries {
                warn!(
                    attempts = attempt + 1,
                    endpoint = %endpoint,
                    error = %error,
                    "RPC request failed, retries exhausted"
                );
                return Err(RpcError::exhausted(attempt + 1, endpoint, error));
            }

            let rate_limited = is_rate_limited(&error);
            let delay = self.policy.delay_for(attempt, rate_limited);

            warn!(
                attempt,
                endpoint = %endpoint,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                rate_limited,
                error = %error,
                "RPC request failed, failing over"
            );

            self.pool.advance();
            if !delay.is_zero() {
                self.clock.sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
