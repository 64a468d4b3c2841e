//! Endpoint resolution from flags and environment.
//!
//! Precedence, highest first:
//! 1. Explicit URL and/or comma-separated list (`NOIRFORGE_RPC_URL`,
//!    `NOIRFORGE_RPC_ENDPOINTS`)
//! 2. A named provider (`NOIRFORGE_RPC_PROVIDER`), or one auto-detected from
//!    which provider env vars are set
//! 3. The public URL for the cluster

use figment::{providers::Env, Figment};
use noirforge_core::{ConfigError, ProviderKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::RpcProviderConfig;

/// Raw endpoint settings as read from flags or `NOIRFORGE_*` env vars.
///
/// Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// `NOIRFORGE_RPC_URL` / `--rpc-url`
    pub rpc_url: Option<String>,
    /// `NOIRFORGE_RPC_ENDPOINTS` / `--rpc-endpoints`
    pub rpc_endpoints: Option<String>,
    /// `NOIRFORGE_RPC_PROVIDER` / `--rpc-provider`
    pub rpc_provider: Option<String>,
    /// `NOIRFORGE_QUICKNODE_RPC_URL`
    pub quicknode_rpc_url: Option<String>,
    /// `NOIRFORGE_QUICKNODE_RPC_ENDPOINTS`
    pub quicknode_rpc_endpoints: Option<String>,
    /// `NOIRFORGE_HELIUS_RPC_URL`
    pub helius_rpc_url: Option<String>,
    /// `NOIRFORGE_HELIUS_RPC_ENDPOINTS`
    pub helius_rpc_endpoints: Option<String>,
    /// `NOIRFORGE_WS_URL` / `--ws-url`
    pub ws_url: Option<String>,
    /// `NOIRFORGE_WS_ENDPOINTS` / `--ws-endpoints`
    pub ws_endpoints: Option<String>,
    /// `NOIRFORGE_QUICKNODE_WS_URL`
    pub quicknode_ws_url: Option<String>,
    /// `NOIRFORGE_QUICKNODE_WS_ENDPOINTS`
    pub quicknode_ws_endpoints: Option<String>,
    /// `NOIRFORGE_HELIUS_WS_URL`
    pub helius_ws_url: Option<String>,
    /// `NOIRFORGE_HELIUS_WS_ENDPOINTS`
    pub helius_ws_endpoints: Option<String>,
}

/// Provider choice after applying auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProviderChoice {
    Default,
    Named(ProviderKind),
}

impl RpcSettings {
    /// Reads settings from `NOIRFORGE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the environment cannot be extracted.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Env::prefixed("NOIRFORGE_")))
    }

    /// Reads settings from an arbitrary figment, e.g. env merged with flags.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::invalid(format!("failed to read RPC settings: {e}")))
    }

    /// Resolves the request endpoint list for `cluster`.
    ///
    /// # Errors
    ///
    /// - `UnknownProvider` for a provider name other than `default`,
    ///   `quicknode`, `helius`
    /// - `ProviderNotConfigured` when a named provider has no endpoints set
    pub fn rpc_endpoints(&self, cluster: &str) -> Result<Vec<String>, ConfigError> {
        let mut endpoints = explicit(&self.rpc_url, &self.rpc_endpoints);

        if endpoints.is_empty() {
            match self.provider_choice(Self::rpc_vars)? {
                ProviderChoice::Default => endpoints.push(cluster_rpc_url(cluster)),
                ProviderChoice::Named(kind) => {
                    let (url, list) = self.rpc_vars(kind);
                    endpoints = explicit(url, list);
                    if endpoints.is_empty() {
                        return Err(ConfigError::provider_not_configured(
                            kind.as_str(),
                            rpc_env_vars(kind),
                        ));
                    }
                },
            }
        }

        let endpoints = dedup(endpoints);
        debug!(count = endpoints.len(), "Resolved RPC endpoints");
        Ok(endpoints)
    }

    /// Resolves the websocket endpoint list, if any is configured.
    ///
    /// Unknown provider names yield `None` here; `rpc_endpoints` reports them.
    pub fn ws_endpoints(&self) -> Option<Vec<String>> {
        let mut endpoints = explicit(&self.ws_url, &self.ws_endpoints);

        if endpoints.is_empty() {
            if let Ok(ProviderChoice::Named(kind)) = self.provider_choice(Self::ws_vars) {
                let (url, list) = self.ws_vars(kind);
                endpoints = explicit(url, list);
            }
        }

        (!endpoints.is_empty()).then(|| dedup(endpoints))
    }

    /// Builds a provider config for `cluster` with default retry settings.
    ///
    /// # Errors
    ///
    /// Propagates endpoint resolution errors.
    pub fn provider_config(&self, cluster: &str) -> Result<RpcProviderConfig, ConfigError> {
        let endpoints = self.rpc_endpoints(cluster)?;
        Ok(RpcProviderConfig::new(endpoints).with_ws_endpoints(self.ws_endpoints()))
    }

    fn provider_choice(
        &self,
        vars: fn(&Self, ProviderKind) -> (&Option<String>, &Option<String>),
    ) -> Result<ProviderChoice, ConfigError> {
        if let Some(name) = non_empty(&self.rpc_provider) {
            if name.eq_ignore_ascii_case("default") {
                return Ok(ProviderChoice::Default);
            }
            return name.parse().map(ProviderChoice::Named);
        }

        let configured = |kind| {
            let (url, list) = vars(self, kind);
            non_empty(url).is_some() || non_empty(list).is_some()
        };

        Ok([ProviderKind::QuickNode, ProviderKind::Helius]
            .into_iter()
            .find(|kind| configured(*kind))
            .map_or(ProviderChoice::Default, ProviderChoice::Named))
    }

    fn rpc_vars(&self, kind: ProviderKind) -> (&Option<String>, &Option<String>) {
        match kind {
            ProviderKind::QuickNode => (&self.quicknode_rpc_url, &self.quicknode_rpc_endpoints),
            ProviderKind::Helius => (&self.helius_rpc_url, &self.helius_rpc_endpoints),
        }
    }

    fn ws_vars(&self, kind: ProviderKind) -> (&Option<String>, &Option<String>) {
        match kind {
            ProviderKind::QuickNode => (&self.quicknode_ws_url, &self.quicknode_ws_endpoints),
            ProviderKind::Helius => (&self.helius_ws_url, &self.helius_ws_endpoints),
        }
    }
}

/// Public RPC URL for a cluster name; unknown names are used verbatim.
pub fn cluster_rpc_url(cluster: &str) -> String {
    match cluster {
        "localhost" | "localnet" => "http://127.0.0.1:8899".to_string(),
        "devnet" | "testnet" | "mainnet-beta" => format!("https://api.{cluster}.solana.com"),
        other => other.to_string(),
    }
}

fn rpc_env_vars(kind: ProviderKind) -> [&'static str; 2] {
    match kind {
        ProviderKind::QuickNode => {
            ["NOIRFORGE_QUICKNODE_RPC_URL", "NOIRFORGE_QUICKNODE_RPC_ENDPOINTS"]
        },
        ProviderKind::Helius => ["NOIRFORGE_HELIUS_RPC_URL", "NOIRFORGE_HELIUS_RPC_ENDPOINTS"],
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// URL first, then the comma-separated list, trimmed with empties dropped.
fn explicit(url: &Option<String>, list: &Option<String>) -> Vec<String> {
    let mut endpoints: Vec<String> = non_empty(url).map(str::to_string).into_iter().collect();
    if let Some(list) = non_empty(list) {
        endpoints.extend(
            list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
        );
    }
    endpoints
}

fn dedup(endpoints: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    endpoints.into_iter().filter(|e| seen.insert(e.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn cluster_urls() {
        assert_eq!(cluster_rpc_url("localhost"), "http://127.0.0.1:8899");
        assert_eq!(cluster_rpc_url("localnet"), "http://127.0.0.1:8899");
        assert_eq!(cluster_rpc_url("devnet"), "https://api.devnet.solana.com");
        assert_eq!(cluster_rpc_url("mainnet-beta"), "https://api.mainnet-beta.solana.com");
        assert_eq!(cluster_rpc_url("https://rpc.example.com"), "https://rpc.example.com");
    }

    #[test]
    fn nothing_configured_uses_cluster_url() {
        let settings = RpcSettings::default();
        assert_eq!(settings.rpc_endpoints("devnet").unwrap(), ["https://api.devnet.solana.com"]);
        assert_eq!(settings.ws_endpoints(), None);
    }

    #[test]
    fn explicit_url_and_list_win_over_providers() {
        let settings = RpcSettings {
            rpc_url: some("https://one"),
            rpc_endpoints: some(" https://two , ,https://one,https://three"),
            quicknode_rpc_url: some("https://qn"),
            ..Default::default()
        };

        assert_eq!(
            settings.rpc_endpoints("devnet").unwrap(),
            ["https://one", "https://two", "https://three"]
        );
    }

    #[test]
    fn provider_is_auto_detected_quicknode_first() {
        let settings = RpcSettings {
            quicknode_rpc_endpoints: some("https://qn1,https://qn2"),
            helius_rpc_url: some("https://helius"),
            ..Default::default()
        };

        assert_eq!(settings.rpc_endpoints("devnet").unwrap(), ["https://qn1", "https://qn2"]);
    }

    #[test]
    fn explicit_provider_selects_its_endpoints() {
        let settings = RpcSettings {
            rpc_provider: some("Helius"),
            quicknode_rpc_url: some("https://qn"),
            helius_rpc_url: some("https://helius"),
            ..Default::default()
        };

        assert_eq!(settings.rpc_endpoints("devnet").unwrap(), ["https://helius"]);
    }

    #[test]
    fn explicit_default_provider_ignores_provider_vars() {
        let settings = RpcSettings {
            rpc_provider: some("default"),
            quicknode_rpc_url: some("https://qn"),
            ..Default::default()
        };

        assert_eq!(settings.rpc_endpoints("localnet").unwrap(), ["http://127.0.0.1:8899"]);
    }

    #[test]
    fn named_but_unconfigured_provider_is_an_error() {
        let settings = RpcSettings { rpc_provider: some("quicknode"), ..Default::default() };

        let err = settings.rpc_endpoints("devnet").unwrap_err();
        assert_eq!(
            err,
            ConfigError::provider_not_configured(
                "quicknode",
                ["NOIRFORGE_QUICKNODE_RPC_URL", "NOIRFORGE_QUICKNODE_RPC_ENDPOINTS"]
            )
        );
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let settings = RpcSettings { rpc_provider: some("alchemy"), ..Default::default() };
        assert_eq!(
            settings.rpc_endpoints("devnet").unwrap_err(),
            ConfigError::unknown_provider("alchemy")
        );
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let settings = RpcSettings {
            rpc_url: some(""),
            rpc_provider: some(""),
            quicknode_rpc_url: some(""),
            ..Default::default()
        };

        assert_eq!(settings.rpc_endpoints("devnet").unwrap(), ["https://api.devnet.solana.com"]);
    }

    #[test]
    fn ws_endpoints_follow_same_precedence() {
        let settings = RpcSettings {
            helius_ws_url: some("wss://helius"),
            helius_ws_endpoints: some("wss://helius,wss://helius2"),
            ..Default::default()
        };
        assert_eq!(settings.ws_endpoints().unwrap(), ["wss://helius", "wss://helius2"]);

        let settings = RpcSettings {
            ws_url: some("wss://explicit"),
            helius_ws_url: some("wss://helius"),
            ..Default::default()
        };
        assert_eq!(settings.ws_endpoints().unwrap(), ["wss://explicit"]);
    }

    #[test]
    fn provider_config_pairs_rpc_and_ws() {
        let settings = RpcSettings {
            quicknode_rpc_url: some("https://qn"),
            quicknode_ws_url: some("wss://qn"),
            ..Default::default()
        };

        let config = settings.provider_config("devnet").unwrap();
        assert_eq!(config.endpoints, ["https://qn"]);
        assert_eq!(config.ws_endpoints, Some(vec!["wss://qn".to_string()]));
        assert_eq!(config.max_retries, 3);
    }
}
