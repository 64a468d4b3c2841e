//! HMAC-SHA256 signing and constant-time comparison for webhook payloads.
//!
//! QuickNode signs `nonce || timestamp || body` with the shared secret and
//! sends the lowercase hex digest in `x-qn-signature`. Comparison decodes both
//! hex strings and compares the raw bytes without early exit.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature computation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The secret key was rejected by the MAC.
    #[error("invalid secret key")]
    InvalidSecret,
}

/// Generates an HMAC-SHA256 signature as a lowercase hex string.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret key is rejected.
pub fn generate_hmac_hex(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Expected QuickNode signature for a delivery.
///
/// The body is interpreted as UTF-8 (invalid sequences replaced) before being
/// appended to the signed message, matching how the sender builds it.
///
/// # Example
///
/// ```
/// use noirforge_webhooks::crypto::{quicknode_signature, timing_safe_eq_hex};
///
/// let sig = quicknode_signature("s", "n1", "1700000000", br#"{"slot":1}"#).unwrap();
/// assert_eq!(sig.len(), 64);
/// assert!(timing_safe_eq_hex(&sig, &sig.to_uppercase()));
/// ```
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret key is rejected.
pub fn quicknode_signature(
    secret: &str,
    nonce: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<String, SignatureError> {
    let body = String::from_utf8_lossy(body);
    let mut message = String::with_capacity(nonce.len() + timestamp.len() + body.len());
    message.push_str(nonce);
    message.push_str(timestamp);
    message.push_str(&body);

    generate_hmac_hex(message.as_bytes(), secret)
}

/// Constant-time comparison of two hex-encoded digests.
///
/// Returns `false` when either side is not valid hex or the decoded lengths
/// differ. Hex case does not matter.
pub fn timing_safe_eq_hex(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (hex::decode(a), hex::decode(b)) else {
        return false;
    };

    timing_safe_eq(&a, &b)
}

fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.iter().zip(b.iter()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
