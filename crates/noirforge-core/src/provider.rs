//! RPC infrastructure providers known to noirforge.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A named RPC infrastructure provider.
///
/// Selects both which env vars feed the RPC endpoint pool and which
/// authentication scheme the webhook gateway applies to inbound deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// QuickNode: HMAC-signed webhooks, `NOIRFORGE_QUICKNODE_*` endpoints.
    QuickNode,
    /// Helius: bearer-authorized webhooks, `NOIRFORGE_HELIUS_*` endpoints.
    Helius,
}

impl ProviderKind {
    /// Lowercase wire name, as written to event logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuickNode => "quicknode",
            Self::Helius => "helius",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    /// Parses a provider name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quicknode" => Ok(Self::QuickNode),
            "helius" => Ok(Self::Helius),
            _ => Err(ConfigError::unknown_provider(s)),
        }
    }
}
