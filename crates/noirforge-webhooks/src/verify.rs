//! Provider authentication.
//!
//! The verifier is chosen once from the configured provider name and then
//! applied to every delivery.

use axum::http::HeaderMap;
use noirforge_core::{ConfigError, ProviderKind};
use tracing::debug;

use crate::{
    crypto::{quicknode_signature, timing_safe_eq_hex},
    outcome::Outcome,
    WebhookConfig,
};

/// QuickNode nonce header.
pub const QN_NONCE_HEADER: &str = "x-qn-nonce";
/// QuickNode timestamp header (unix seconds).
pub const QN_TIMESTAMP_HEADER: &str = "x-qn-timestamp";
/// QuickNode signature header (hex HMAC-SHA256).
pub const QN_SIGNATURE_HEADER: &str = "x-qn-signature";

/// Authentication scheme for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verifier {
    /// HMAC-SHA256 over nonce, timestamp and body with a replay window.
    QuickNode {
        /// Shared secret; `None` means the gateway is misconfigured.
        secret: Option<String>,
        /// Allowed skew between the signed timestamp and now.
        replay_skew_ms: u64,
    },
    /// Exact match on the `Authorization` header.
    Helius {
        /// Expected header value; `None` means the gateway is misconfigured.
        authorization: Option<String>,
    },
}

impl Verifier {
    /// Builds the verifier for the configured provider.
    ///
    /// Empty secrets count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownProvider` if the provider name is not
    /// recognised.
    pub fn from_config(config: &WebhookConfig) -> Result<Self, ConfigError> {
        let kind: ProviderKind = config.provider.parse()?;
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        Ok(match kind {
            ProviderKind::QuickNode => Self::QuickNode {
                secret: non_empty(&config.quicknode_secret),
                replay_skew_ms: config.replay_skew_ms,
            },
            ProviderKind::Helius => {
                Self::Helius { authorization: non_empty(&config.helius_authorization) }
            },
        })
    }

    /// Provider this verifier authenticates.
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::QuickNode { .. } => ProviderKind::QuickNode,
            Self::Helius { .. } => ProviderKind::Helius,
        }
    }

    /// Authenticates one delivery.
    ///
    /// `body` is the decompressed payload and `now_ms` the receipt time in
    /// unix milliseconds.
    ///
    /// # Errors
    ///
    /// Returns the rejection outcome: `ServerMisconfigured`, `MissingHeaders`,
    /// `ReplayRejected`, `InvalidSignature`, or `Unauthorized`.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8], now_ms: u64) -> Result<(), Outcome> {
        match self {
            Self::QuickNode { secret, replay_skew_ms } => {
                let secret = secret.as_deref().ok_or(Outcome::ServerMisconfigured)?;
                verify_quicknode(secret, *replay_skew_ms, headers, body, now_ms)
            },
            Self::Helius { authorization } => {
                let expected = authorization.as_deref().ok_or(Outcome::ServerMisconfigured)?;
                let provided = header_str(headers, axum::http::header::AUTHORIZATION.as_str());

                if provided == Some(expected) {
                    Ok(())
                } else {
                    debug!("authorization header mismatch");
                    Err(Outcome::Unauthorized)
                }
            },
        }
    }
}

fn verify_quicknode(
    secret: &str,
    replay_skew_ms: u64,
    headers: &HeaderMap,
    body: &[u8],
    now_ms: u64,
) -> Result<(), Outcome> {
    let (Some(nonce), Some(timestamp), Some(signature)) = (
        header_str(headers, QN_NONCE_HEADER),
        header_str(headers, QN_TIMESTAMP_HEADER),
        header_str(headers, QN_SIGNATURE_HEADER),
    ) else {
        return Err(Outcome::MissingHeaders);
    };

    if !within_replay_window(timestamp, now_ms, replay_skew_ms) {
        debug!(timestamp, now_ms, "timestamp outside replay window");
        return Err(Outcome::ReplayRejected);
    }

    let expected =
        quicknode_signature(secret, nonce, timestamp, body).map_err(|_| Outcome::InvalidSignature)?;

    if timing_safe_eq_hex(signature, &expected) {
        Ok(())
    } else {
        Err(Outcome::InvalidSignature)
    }
}

/// Whether a unix-seconds `timestamp` lies within `skew_ms` of `now_ms`.
///
/// Fractional seconds are accepted; anything that is not a finite number is
/// outside the window.
pub fn within_replay_window(timestamp: &str, now_ms: u64, skew_ms: u64) -> bool {
    let Ok(seconds) = timestamp.trim().parse::<f64>() else {
        return false;
    };
    if !seconds.is_finite() {
        return false;
    }

    #[allow(clippy::cast_precision_loss)]
    let drift = (now_ms as f64 - seconds * 1000.0).abs();
    #[allow(clippy::cast_precision_loss)]
    let allowed = skew_ms as f64;
    drift <= allowed
}

/// Non-empty UTF-8 header value.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}
