//! Gateway context shared by every request handler.

use std::sync::Arc;

use noirforge_core::{Clock, ProviderKind, RealClock};

use crate::{
    error::GatewayError, idempotency::IdempotencyStore, journal::Journal, verify::Verifier,
    WebhookConfig,
};

/// Everything one gateway instance owns: configuration, the selected
/// verifier, its idempotency store, its JSONL sinks, and its clock.
///
/// Two gateways never share state.
#[derive(Debug)]
pub struct Gateway {
    config: WebhookConfig,
    verifier: Verifier,
    idempotency: IdempotencyStore,
    journal: Journal,
    clock: Arc<dyn Clock>,
}

impl Gateway {
    /// Creates a gateway using the system clock.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the provider name is unknown.
    pub fn new(config: WebhookConfig) -> Result<Self, GatewayError> {
        Self::with_clock(config, RealClock::shared())
    }

    /// Creates a gateway reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the provider name is unknown.
    pub fn with_clock(config: WebhookConfig, clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        let verifier = Verifier::from_config(&config)?;
        let idempotency = IdempotencyStore::new(config.idempotency_ttl_ms);
        let journal = Journal::from_config(&config);

        Ok(Self { config, verifier, idempotency, journal, clock })
    }

    /// Configuration this gateway was built from.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Configured provider.
    pub fn provider(&self) -> ProviderKind {
        self.verifier.provider()
    }

    /// Provider authentication.
    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Accepted idempotency keys.
    pub fn idempotency(&self) -> &IdempotencyStore {
        &self.idempotency
    }

    /// Event, dead-letter, and audit sinks.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Time source.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use noirforge_core::{ConfigError, TestClock};

    use super::*;

    #[test]
    fn unknown_provider_fails_construction() {
        let config = WebhookConfig { provider: "alchemy".to_string(), ..WebhookConfig::default() };

        let err = Gateway::new(config).unwrap_err();
        assert!(matches!(err, GatewayError::Config(ConfigError::UnknownProvider { .. })));
    }

    #[test]
    fn gateways_do_not_share_idempotency_state() {
        let clock = TestClock::at_unix_millis(1_000);
        let a = Gateway::with_clock(WebhookConfig::default(), clock.shared()).unwrap();
        let b = Gateway::with_clock(WebhookConfig::default(), clock.shared()).unwrap();

        a.idempotency().put("k", clock.unix_millis());

        assert!(a.idempotency().has("k", clock.unix_millis()));
        assert!(!b.idempotency().has("k", clock.unix_millis()));
        assert_eq!(a.provider(), ProviderKind::QuickNode);
    }
}
