//! Ordered, rotating pool of RPC endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};

use noirforge_core::ConfigError;

use crate::connection::{Commitment, ConnectionTarget};

/// Fixed list of RPC endpoints with a single rotating cursor.
///
/// Websocket endpoints pair with request endpoints by index when both lists
/// have the same length; a single websocket endpoint is shared by all request
/// endpoints; any other length is ignored.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<String>,
    ws_endpoints: Option<Vec<String>>,
    cursor: AtomicUsize,
}

impl EndpointPool {
    /// Creates a pool positioned at the first endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoEndpoints` if `endpoints` is empty.
    pub fn new(
        endpoints: impl IntoIterator<Item = String>,
        ws_endpoints: Option<Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let endpoints: Vec<String> = endpoints.into_iter().collect();
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        Ok(Self { endpoints, ws_endpoints, cursor: AtomicUsize::new(0) })
    }

    /// Number of request endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; a pool is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All request endpoints in rotation order.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Cursor position.
    pub fn index(&self) -> usize {
        self.cursor.load(Ordering::Acquire) % self.endpoints.len()
    }

    /// Current request endpoint.
    pub fn current(&self) -> &str {
        &self.endpoints[self.index()]
    }

    /// Websocket endpoint paired with the current request endpoint.
    pub fn current_ws(&self) -> Option<&str> {
        self.ws_at(self.index())
    }

    /// Moves the cursor to the next endpoint, wrapping at the end.
    pub fn advance(&self) {
        let len = self.endpoints.len();
        // fetch_update only fails when the closure returns None
        let _ = self.cursor.fetch_update(Ordering::AcqRel, Ordering::Acquire, |idx| {
            Some((idx + 1) % len)
        });
    }

    /// Snapshot of the current endpoint pair, read under one cursor load.
    pub fn target(&self, commitment: Commitment) -> ConnectionTarget {
        let idx = self.index();
        ConnectionTarget {
            endpoint: self.endpoints[idx].clone(),
            ws_endpoint: self.ws_at(idx).map(str::to_string),
            commitment,
        }
    }

    fn ws_at(&self, idx: usize) -> Option<&str> {
        let ws = self.ws_endpoints.as_deref()?;
        if ws.len() == self.endpoints.len() {
            ws.get(idx).map(String::as_str)
        } else if ws.len() == 1 {
            ws.first().map(String::as_str)
        } else {
            None
        }
    }
}
