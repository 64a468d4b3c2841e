//! Gateway configuration.
//!
//! Loaded in priority order (highest first):
//! 1. Environment variables prefixed `NOIRFORGE_WEBHOOK_`, plus the two
//!    provider secrets `NOIRFORGE_QN_WEBHOOK_SECRET` and
//!    `NOIRFORGE_HELIUS_WEBHOOK_AUTHORIZATION`
//! 2. Configuration file (`noirforge-webhooks.toml`)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "noirforge-webhooks.toml";

/// Prefix for gateway environment variables.
pub const ENV_PREFIX: &str = "NOIRFORGE_WEBHOOK_";

/// Environment variable holding the QuickNode HMAC secret.
pub const QUICKNODE_SECRET_ENV: &str = "NOIRFORGE_QN_WEBHOOK_SECRET";

/// Environment variable holding the expected Helius `Authorization` value.
pub const HELIUS_AUTHORIZATION_ENV: &str = "NOIRFORGE_HELIUS_WEBHOOK_AUTHORIZATION";

/// Command-line overrides applied on top of every other source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    /// Provider name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Bind host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Bind port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Delivery path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Webhook gateway configuration.
///
/// # Example
///
/// ```no_run
/// use noirforge_webhooks::WebhookConfig;
///
/// let config = WebhookConfig::load().expect("failed to load configuration");
/// println!("listening on {}:{}{}", config.host, config.port, config.path);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Provider whose authentication scheme is enforced (`quicknode` or
    /// `helius`).
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_PROVIDER`
    #[serde(deserialize_with = "deserialize_text")]
    pub provider: String,
    /// Bind host.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_HOST`
    #[serde(deserialize_with = "deserialize_text")]
    pub host: String,
    /// Bind port.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_PORT`
    pub port: u16,
    /// The single path accepting deliveries.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_PATH`
    #[serde(deserialize_with = "deserialize_text")]
    pub path: String,
    /// QuickNode HMAC secret.
    ///
    /// Environment variable: `NOIRFORGE_QN_WEBHOOK_SECRET`
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub quicknode_secret: Option<String>,
    /// Exact `Authorization` header value Helius sends.
    ///
    /// Environment variable: `NOIRFORGE_HELIUS_WEBHOOK_AUTHORIZATION`
    #[serde(deserialize_with = "deserialize_optional_text")]
    pub helius_authorization: Option<String>,
    /// JSONL file receiving accepted events.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_EVENTS_PATH`
    pub events_path: Option<PathBuf>,
    /// JSONL file receiving events that failed after authentication.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_DLQ_PATH`
    pub dlq_path: Option<PathBuf>,
    /// Also write audit records to stderr as JSON lines.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_OBS_LOG`
    #[serde(deserialize_with = "deserialize_flag")]
    pub obs_log: bool,
    /// JSONL file receiving audit records.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_OBS_EVENTS_PATH`
    pub obs_events_path: Option<PathBuf>,
    /// Maximum body size in bytes, applied before and after decompression.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_MAX_BODY_BYTES`
    pub max_body_bytes: usize,
    /// Allowed distance between a signed timestamp and receipt time.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_REPLAY_SKEW_MS`
    pub replay_skew_ms: u64,
    /// How long an accepted idempotency key suppresses redelivery.
    ///
    /// Environment variable: `NOIRFORGE_WEBHOOK_IDEMPOTENCY_TTL_MS`
    pub idempotency_ttl_ms: u64,
}

impl WebhookConfig {
    /// Loads configuration from defaults, `noirforge-webhooks.toml`, and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment(CONFIG_FILE))
    }

    /// Loads configuration from `file` and the environment, then applies
    /// `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_from(file: impl AsRef<Path>, overrides: &ConfigOverrides) -> Result<Self> {
        Self::from_figment(Self::figment(file).merge(Serialized::defaults(overrides.clone())))
    }

    /// Layered configuration sources using `file` as the config file.
    ///
    /// A missing file is skipped. Callers may merge further providers (such
    /// as command-line overrides) before extracting.
    ///
    /// The provider secrets are read verbatim rather than through figment's
    /// value parsing, so `00042` stays `00042`.
    pub fn figment(file: impl AsRef<Path>) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(file.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX));

        for (var, key) in [
            (QUICKNODE_SECRET_ENV, "quicknode_secret"),
            (HELIUS_AUTHORIZATION_ENV, "helius_authorization"),
        ] {
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        figment
    }

    /// Extracts and validates configuration from `figment`.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if !self.path.starts_with('/') {
            anyhow::bail!("path must start with '/', got {:?}", self.path);
        }

        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than 0");
        }

        if self.idempotency_ttl_ms == 0 {
            anyhow::bail!("idempotency_ttl_ms must be greater than 0");
        }

        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            provider: "quicknode".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8787,
            path: "/webhook".to_string(),
            quicknode_secret: None,
            helius_authorization: None,
            events_path: None,
            dlq_path: None,
            obs_log: false,
            obs_events_path: None,
            max_body_bytes: 50 * 1024 * 1024,
            replay_skew_ms: 5 * 60 * 1000,
            idempotency_ttl_ms: 10 * 60 * 1000,
        }
    }
}

/// Accepts `true`/`false`, `1`/`0`, and `yes`/`no`/`on`/`off` strings.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
        Flag::Text(value) => {
            matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        },
    })
}

/// Scalar that should be read as text even when it parses as a number or
/// boolean.
#[derive(Deserialize)]
#[serde(untagged)]
enum Text {
    Text(String),
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Text {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Bool(value) => value.to_string(),
            Self::Unsigned(value) => value.to_string(),
            Self::Signed(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
        }
    }
}

fn deserialize_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Text::deserialize(deserializer).map(Text::into_string)
}

fn deserialize_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<Text>::deserialize(deserializer).map(|value| value.map(Text::into_string))
}
