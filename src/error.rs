//! Error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by a gateway connection
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential file could not be read or parsed
    #[error("invalid credentials in '{}': {reason}", .path.display())]
    Credentials {
        /// Path of the credential file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Socket-level failure (connect, name resolution, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake failure
    #[error("TLS handshake failed: {0}")]
    Handshake(io::Error),

    /// Connection was found closed before an operation
    #[error("connection closed")]
    ConnectionClosed,

    /// Every attempt in the retry budget failed
    #[error("{message} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Message of the last underlying failure
        message: String,
    },
}

impl Error {
    /// Whether reconnecting and replaying the operation may succeed.
    ///
    /// Configuration and credential problems never heal by reconnecting, and an
    /// exhausted retry budget is final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Handshake(_) | Error::ConnectionClosed
        )
    }

    pub(crate) fn credentials(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Credentials {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
