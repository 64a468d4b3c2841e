//! Shared primitives for the noirforge network core.
//!
//! Both the RPC provider and the webhook gateway talk to the same set of
//! infrastructure providers and need the same notion of time. This crate
//! holds those shared pieces so neither subsystem depends on the other.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod time;

pub use error::ConfigError;
pub use provider::ProviderKind;
pub use time::{Clock, RealClock, TestClock};
