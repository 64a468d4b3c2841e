//! Failover RPC provider for blockchain endpoints.
//!
//! Issues requests against a rotating pool of RPC endpoints, classifies
//! failures, and retries with jittered exponential backoff. Rate-limit
//! signals escalate the delay; every failed attempt fails over to the next
//! endpoint in the pool.
//!
//! # Retry loop
//!
//! 1. **Connect** - build a fresh connection for the current endpoint
//! 2. **Attempt** - run the caller's operation against it
//! 3. **Back off** - on failure, compute the delay and advance the pool
//! 4. **Give up** - after `max_retries` retries, report the last endpoint and
//!    cause as one error
//!
//! # Example
//!
//! ```no_run
//! use noirforge_rpc::{RpcProvider, RpcProviderConfig};
//!
//! # async fn example() -> Result<(), noirforge_rpc::RpcError> {
//! let config = RpcProviderConfig::new([
//!     "https://a.example.com".to_string(),
//!     "https://b.example.com".to_string(),
//! ]);
//! let provider = RpcProvider::new(config)?;
//!
//! let slot = provider.with_connection(|conn| async move { conn.get_slot().await }).await?;
//! println!("current slot: {slot}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod connection;
pub mod error;
pub mod pool;
pub mod provider;
pub mod resolve;

pub use backoff::{is_rate_limited, BackoffPolicy};
pub use connection::{Commitment, ConnectionTarget, Connector, HttpConnector, RpcConnection};
pub use error::{BoxError, RpcCallError, RpcError};
pub use pool::EndpointPool;
pub use provider::{RpcProvider, RpcProviderConfig};
pub use resolve::{cluster_rpc_url, RpcSettings};

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;

/// Default cap on the computed backoff delay, in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Default minimum delay after a rate-limited attempt, in milliseconds.
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1_000;
