//! Gateway error types.

use std::{io, path::PathBuf};

use noirforge_core::ConfigError;
use thiserror::Error;

/// Errors starting or running the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid configuration detected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Listener could not be bound or the server failed.
    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

/// Errors appending to a JSONL log.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The file could not be opened or written.
    #[error("failed to append to {}: {source}", path.display())]
    Io {
        /// Target file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The record could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl JournalError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Path of the file that failed, if the failure was I/O.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Serialize(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_file() {
        let err = JournalError::io(
            "/missing/events.jsonl",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );

        insta::assert_snapshot!(err.to_string(), @"failed to append to /missing/events.jsonl: No such file or directory");
        assert_eq!(err.path(), Some(std::path::Path::new("/missing/events.jsonl")));
    }

    #[test]
    fn config_errors_pass_through() {
        let err = GatewayError::from(ConfigError::unknown_provider("alchemy"));
        assert_eq!(err.to_string(), "unknown_provider: alchemy");
    }
}
