//! Webhook ingestion pipeline.
//!
//! Order of checks:
//! 1. method and path (query string included)
//! 2. bounded body read, then optional gunzip (also bounded)
//! 3. idempotency key derivation and duplicate lookup
//! 4. provider authentication
//! 5. atomic key claim and event append, dead-lettering on failure
//!
//! Duplicates are answered before authentication so a sender retrying an
//! accepted delivery never has to re-sign it. The key is claimed again after
//! authentication so concurrent first deliveries are accepted once.

use std::{borrow::Cow, io::Read, sync::Arc};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use flate2::read::MultiGzDecoder;
use http_body_util::BodyExt;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    crypto::sha256_hex,
    journal::{AuditRecord, DeadLetterRecord, WebhookEvent},
    outcome::Outcome,
    verify::QN_NONCE_HEADER,
    Gateway, IDEMPOTENCY_HEADER, NOIRFORGE_IDEMPOTENCY_HEADER,
};

/// Audit fields filled in as the pipeline progresses.
#[derive(Debug, Default)]
struct Trail {
    idempotency_key: Option<String>,
    payload_sha256: Option<String>,
    error: Option<String>,
}

/// Handles one request and emits its audit record.
#[instrument(
    name = "ingest_webhook",
    skip_all,
    fields(method = %req.method(), path = %req.uri().path())
)]
pub async fn ingest_webhook(State(gateway): State<Arc<Gateway>>, req: Request) -> Response {
    let started = gateway.clock().now();
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), ToString::to_string);

    let mut trail = Trail::default();
    let outcome = process(&gateway, req, &mut trail).await;

    let elapsed = gateway.clock().now().saturating_duration_since(started);
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    let mut record = AuditRecord::new(
        gateway.clock().unix_millis(),
        gateway.provider(),
        method,
        path,
        outcome,
        duration_ms,
    );
    record.idempotency_key = trail.idempotency_key;
    record.payload_sha256 = trail.payload_sha256;
    record.error = trail.error;
    gateway.journal().emit_audit(&record).await;

    outcome.into_response()
}

async fn process(gateway: &Gateway, req: Request, trail: &mut Trail) -> Outcome {
    if !accepts(gateway, req.method(), req.uri()) {
        return Outcome::NotFound;
    }

    let (parts, body) = req.into_parts();
    let limit = gateway.config().max_body_bytes;

    if declared_length(&parts.headers).is_some_and(|len| len > limit) {
        warn!(limit, "declared content length exceeds limit");
        return Outcome::PayloadTooLarge;
    }

    let raw = match read_body(body, limit).await {
        Ok(raw) => raw,
        Err(outcome) => return outcome,
    };
    let body = if is_gzip(&parts.headers) {
        match tokio::task::spawn_blocking(move || gunzip(&raw, limit)).await {
            Ok(Ok(body)) => body,
            Ok(Err(outcome)) => return outcome,
            Err(e) => {
                error!(error = %e, "gzip decode task failed");
                return Outcome::InternalError;
            },
        }
    } else {
        raw
    };

    let digest = sha256_hex(&body);
    let key = idempotency_key(&parts.headers, &digest);
    trail.idempotency_key = Some(key.clone());
    trail.payload_sha256 = Some(digest);

    let now_ms = gateway.clock().unix_millis();

    if gateway.idempotency().has(&key, now_ms) {
        debug!(idempotency_key = %key, "duplicate delivery");
        return Outcome::Duplicate;
    }

    if let Err(rejection) = gateway.verifier().verify(&parts.headers, &body, now_ms) {
        warn!(idempotency_key = %key, outcome = %rejection, "webhook rejected");
        return rejection;
    }

    if !gateway.idempotency().insert_if_absent(&key, now_ms) {
        debug!(idempotency_key = %key, "duplicate delivery accepted concurrently");
        return Outcome::Duplicate;
    }

    let event = WebhookEvent::new(now_ms, gateway.provider(), key, &parts.headers, &body);
    match gateway.journal().append_event(&event).await {
        Ok(()) => {
            info!(idempotency_key = %event.idempotency_key, bytes = body.len(), "webhook accepted");
            Outcome::Ok
        },
        Err(e) => {
            error!(
                idempotency_key = %event.idempotency_key,
                error = %e,
                "failed to persist webhook event"
            );
            let message = e.to_string();
            trail.error = Some(message.clone());

            let record = DeadLetterRecord { event, error: message };
            if let Err(dlq_error) = gateway.journal().append_dead_letter(&record).await {
                error!(error = %dlq_error, "failed to write dead letter");
            }
            Outcome::InternalError
        },
    }
}

fn accepts(gateway: &Gateway, method: &Method, uri: &Uri) -> bool {
    let target = uri.path_and_query().map_or(uri.path(), PathAndQuery::as_str);
    method == Method::POST && target == gateway.config().path
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

/// Reads the body, refusing to buffer more than `limit` bytes.
async fn read_body(mut body: Body, limit: usize) -> Result<Bytes, Outcome> {
    let mut buf = BytesMut::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| {
            debug!(error = %e, "body stream failed");
            Outcome::BadRequest
        })?;
        let Ok(chunk) = frame.into_data() else {
            continue;
        };

        if buf.len().saturating_add(chunk.len()) > limit {
            warn!(limit, "payload exceeds size limit");
            return Err(Outcome::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

/// Decompresses a gzip body, refusing output larger than `limit` bytes.
fn gunzip(raw: &[u8], limit: usize) -> Result<Bytes, Outcome> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut decoded = Vec::new();
    MultiGzDecoder::new(raw).take(cap).read_to_end(&mut decoded).map_err(|e| {
        debug!(error = %e, "malformed gzip body");
        Outcome::BadRequest
    })?;

    if decoded.len() > limit {
        warn!(limit, "decompressed payload exceeds size limit");
        return Err(Outcome::PayloadTooLarge);
    }

    Ok(Bytes::from(decoded))
}

/// First of: explicit idempotency headers, the `x-qn-nonce` header, the body
/// hash.
///
/// The nonce is used whenever present, whichever provider is configured.
fn idempotency_key(headers: &HeaderMap, body_sha256: &str) -> String {
    let value = |name: &str| {
        headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .filter(|v| !v.is_empty())
    };

    value(NOIRFORGE_IDEMPOTENCY_HEADER)
        .or_else(|| value(IDEMPOTENCY_HEADER))
        .or_else(|| value(QN_NONCE_HEADER))
        .map_or_else(|| body_sha256.to_string(), Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::http::HeaderValue;
    use flate2::{write::GzEncoder, Compression};

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn body_at_limit_is_accepted() {
        let body = read_body(Body::from(vec![b'x'; 16]), 16).await.unwrap();
        assert_eq!(body.len(), 16);
    }

    #[tokio::test]
    async fn body_over_limit_is_rejected() {
        let err = read_body(Body::from(vec![b'x'; 17]), 16).await.unwrap_err();
        assert_eq!(err, Outcome::PayloadTooLarge);
    }

    #[test]
    fn gzip_is_detected_from_content_encoding() {
        let mut headers = HeaderMap::new();
        assert!(!is_gzip(&headers));

        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(" GZIP "));
        assert!(is_gzip(&headers));

        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));
        assert!(!is_gzip(&headers));
    }

    #[test]
    fn gzip_round_trips() {
        let decoded = gunzip(&gzip(b"hello"), 64).unwrap();
        assert_eq!(&decoded[..], b"hello");
    }

    #[test]
    fn malformed_gzip_is_bad_request() {
        let err = gunzip(b"not gzip", 64).unwrap_err();
        assert_eq!(err, Outcome::BadRequest);
    }

    #[test]
    fn decompressed_size_is_bounded() {
        let compressed = gzip(&[0u8; 4096]);
        assert!(compressed.len() < 64);

        let err = gunzip(&compressed, 64).unwrap_err();
        assert_eq!(err, Outcome::PayloadTooLarge);
    }

    #[test]
    fn key_precedence() {
        let mut headers = HeaderMap::new();

        assert_eq!(idempotency_key(&headers, "digest"), "digest");

        headers.insert(QN_NONCE_HEADER, HeaderValue::from_static("nonce-1"));
        assert_eq!(idempotency_key(&headers, "digest"), "nonce-1");

        headers.insert(IDEMPOTENCY_HEADER, HeaderValue::from_static("generic"));
        assert_eq!(idempotency_key(&headers, "digest"), "generic");

        headers.insert(NOIRFORGE_IDEMPOTENCY_HEADER, HeaderValue::from_static("explicit"));
        assert_eq!(idempotency_key(&headers, "digest"), "explicit");
    }

    #[test]
    fn empty_key_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert(NOIRFORGE_IDEMPOTENCY_HEADER, HeaderValue::from_static(""));

        assert_eq!(idempotency_key(&headers, "digest"), "digest");
    }

    #[test]
    fn non_ascii_key_header_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            NOIRFORGE_IDEMPOTENCY_HEADER,
            HeaderValue::from_bytes("clé-1".as_bytes()).unwrap(),
        );

        assert_eq!(idempotency_key(&headers, "digest"), "clé-1");
    }

    #[test]
    fn non_utf8_key_header_is_decoded_lossily() {
        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_HEADER, HeaderValue::from_bytes(b"k\xff").unwrap());

        assert_eq!(idempotency_key(&headers, "digest"), "k\u{fffd}");
    }
}
