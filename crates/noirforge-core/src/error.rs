//! Configuration errors shared by the RPC provider and webhook gateway.
//!
//! These are fatal: they surface immediately at construction time and are
//! never retried.

use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The RPC endpoint pool would be empty.
    #[error("RPC provider requires at least one endpoint")]
    NoEndpoints,

    /// A provider name that noirforge does not know.
    #[error("unknown_provider: {name}")]
    UnknownProvider {
        /// The name as it was configured
        name: String,
    },

    /// A provider was selected explicitly but none of its env vars are set.
    #[error("rpc-provider={provider} selected but no endpoints configured. Set {} (or pass --rpc-url/--rpc-endpoints)", .env_vars.join(" or "))]
    ProviderNotConfigured {
        /// Provider name
        provider: String,
        /// Env vars that would configure it
        env_vars: Vec<String>,
    },

    /// Any other invalid setting.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What is wrong
        message: String,
    },
}

impl ConfigError {
    /// Creates an unknown provider error.
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    /// Creates a provider-not-configured error.
    pub fn provider_not_configured(
        provider: impl Into<String>,
        env_vars: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::ProviderNotConfigured {
            provider: provider.into(),
            env_vars: env_vars.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a generic invalid configuration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}
