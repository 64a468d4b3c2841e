//! HTTP request handlers.
//!
//! The gateway serves a single path, so one handler receives every request
//! and decides between `not_found` and the ingestion pipeline itself. That
//! keeps the audit trail uniform: every response, including 404s, produces
//! exactly one audit record.

pub mod ingest;

pub use ingest::ingest_webhook;
