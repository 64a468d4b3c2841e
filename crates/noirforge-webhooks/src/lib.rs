//! Webhook ingestion gateway for RPC infrastructure providers.
//!
//! Receives push notifications over HTTP, authenticates them with the
//! configured provider's scheme, rejects replays, deduplicates retried
//! deliveries, and appends accepted or failed events to JSONL logs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod idempotency;
pub mod journal;
pub mod outcome;
pub mod server;
pub mod verify;

pub use config::{ConfigOverrides, WebhookConfig};
pub use error::{GatewayError, JournalError};
pub use gateway::Gateway;
pub use idempotency::IdempotencyStore;
pub use outcome::Outcome;
pub use server::{create_router, serve, shutdown_signal};
pub use verify::Verifier;

/// Client-supplied idempotency header, checked first.
pub const NOIRFORGE_IDEMPOTENCY_HEADER: &str = "x-noirforge-idempotency-key";

/// Generic idempotency header, checked second.
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";
