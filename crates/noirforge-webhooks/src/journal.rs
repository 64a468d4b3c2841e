//! Append-only JSONL persistence for events, dead letters, and audit records.
//!
//! Each record is serialized to one line and written with a single append.
//! Writers inside one process are serialized; separate processes sharing a
//! file are not coordinated.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use noirforge_core::ProviderKind;
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{info, warn};

use crate::{error::JournalError, outcome::Outcome, WebhookConfig};

/// Audit record kind for webhook requests.
pub const AUDIT_KIND: &str = "webhook_req";

/// Tracing target for audit events.
pub const AUDIT_TARGET: &str = "noirforge::audit";

/// One accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Receipt time, RFC 3339 with milliseconds.
    pub received_at: String,
    /// Provider that sent the delivery.
    pub provider: ProviderKind,
    /// Key the delivery was deduplicated under.
    pub idempotency_key: String,
    /// Request headers; repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    /// Decompressed body, standard base64.
    pub body_base64: String,
}

impl WebhookEvent {
    /// Builds an event from the request parts.
    pub fn new(
        received_at_ms: u64,
        provider: ProviderKind,
        idempotency_key: impl Into<String>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Self {
        Self {
            received_at: rfc3339_millis(received_at_ms),
            provider,
            idempotency_key: idempotency_key.into(),
            headers: flatten_headers(headers),
            body_base64: STANDARD.encode(body),
        }
    }

    /// Decodes the stored body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body_base64` is not valid base64.
    pub fn body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.body_base64)
    }
}

/// An authenticated delivery that could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// The event as it would have been recorded.
    #[serde(flatten)]
    pub event: WebhookEvent,
    /// Why processing failed.
    pub error: String,
}

/// Per-request audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Always [`AUDIT_KIND`].
    pub kind: String,
    /// Emission time, RFC 3339 with milliseconds.
    pub at: String,
    /// Configured provider.
    pub provider: ProviderKind,
    /// Request method.
    pub method: String,
    /// Request path including any query string.
    pub path: String,
    /// Response status code.
    pub status_code: u16,
    /// Response token.
    pub result: String,
    /// Time spent handling the request.
    pub duration_ms: u64,
    /// Idempotency key, once derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// SHA-256 of the decompressed body, once read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
    /// Processing error, when the outcome is `internal_error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Starts a record for a finished request.
    pub fn new(
        at_ms: u64,
        provider: ProviderKind,
        method: impl Into<String>,
        path: impl Into<String>,
        outcome: Outcome,
        duration_ms: u64,
    ) -> Self {
        Self {
            kind: AUDIT_KIND.to_string(),
            at: rfc3339_millis(at_ms),
            provider,
            method: method.into(),
            path: path.into(),
            status_code: outcome.status().as_u16(),
            result: outcome.as_str().to_string(),
            duration_ms,
            idempotency_key: None,
            payload_sha256: None,
            error: None,
        }
    }
}

/// JSONL sinks configured for the gateway.
#[derive(Debug)]
pub struct Journal {
    events_path: Option<PathBuf>,
    dlq_path: Option<PathBuf>,
    obs_events_path: Option<PathBuf>,
    obs_log: bool,
    obs_dir_ready: AtomicBool,
    write_lock: Mutex<()>,
}

impl Journal {
    /// Creates a journal from the configured paths. Empty paths count as
    /// unset.
    pub fn from_config(config: &WebhookConfig) -> Self {
        let non_empty =
            |path: &Option<PathBuf>| path.clone().filter(|p| !p.as_os_str().is_empty());

        Self {
            events_path: non_empty(&config.events_path),
            dlq_path: non_empty(&config.dlq_path),
            obs_events_path: non_empty(&config.obs_events_path),
            obs_log: config.obs_log,
            obs_dir_ready: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    /// Event log path, if configured.
    pub fn events_path(&self) -> Option<&Path> {
        self.events_path.as_deref()
    }

    /// Dead-letter log path, if configured.
    pub fn dlq_path(&self) -> Option<&Path> {
        self.dlq_path.as_deref()
    }

    /// Appends an accepted event. A no-op when no event log is configured.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns `JournalError` if the line cannot be written.
    pub async fn append_event(&self, event: &WebhookEvent) -> Result<(), JournalError> {
        match &self.events_path {
            Some(path) => self.append(path, event).await,
            None => Ok(()),
        }
    }

    /// Appends a dead-letter record. A no-op when no DLQ is configured.
    ///
    /// # Errors
    ///
    /// Returns `JournalError` if the line cannot be written.
    pub async fn append_dead_letter(&self, record: &DeadLetterRecord) -> Result<(), JournalError> {
        match &self.dlq_path {
            Some(path) => self.append(path, record).await,
            None => Ok(()),
        }
    }

    /// Emits an audit record to every configured sink.
    ///
    /// Always traced on [`AUDIT_TARGET`]. Sink failures are logged, never
    /// returned.
    pub async fn emit_audit(&self, record: &AuditRecord) {
        info!(
            target: AUDIT_TARGET,
            method = %record.method,
            path = %record.path,
            status_code = record.status_code,
            result = %record.result,
            duration_ms = record.duration_ms,
            idempotency_key = record.idempotency_key.as_deref(),
            payload_sha256 = record.payload_sha256.as_deref(),
            error = record.error.as_deref(),
            "webhook request"
        );

        if !self.obs_log && self.obs_events_path.is_none() {
            return;
        }

        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize audit record");
                return;
            },
        };

        if self.obs_log {
            let mut stderr = std::io::stderr().lock();
            if let Err(e) = writeln!(stderr, "{line}") {
                warn!(error = %e, "failed to write audit record to stderr");
            }
        }

        if let Some(path) = &self.obs_events_path {
            if let Err(e) = self.append_audit_line(path, &line).await {
                warn!(error = %e, "failed to append audit record");
            }
        }
    }

    async fn append_audit_line(&self, path: &Path, line: &str) -> Result<(), JournalError> {
        if !self.obs_dir_ready.load(Ordering::Acquire) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| JournalError::io(parent, e))?;
            }
            self.obs_dir_ready.store(true, Ordering::Release);
        }

        self.append_line(path, line).await
    }

    async fn append<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), JournalError> {
        let line = serde_json::to_string(record)?;
        self.append_line(path, &line).await
    }

    async fn append_line(&self, path: &Path, line: &str) -> Result<(), JournalError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| JournalError::io(path, e))?;
        file.write_all(buf.as_bytes()).await.map_err(|e| JournalError::io(path, e))?;
        file.flush().await.map_err(|e| JournalError::io(path, e))
    }
}

/// Formats unix milliseconds as RFC 3339 UTC with millisecond precision.
pub fn rfc3339_millis(unix_ms: u64) -> String {
    i64::try_from(unix_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }

    flat
}
