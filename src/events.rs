//! Lifecycle notifications
//!
//! A [`Connection`](crate::connection::Connection) reports opens, closes, and
//! retries to a [`ConnectionEvents`] sink. The default sink logs through
//! `tracing`; tests and embedders can inject their own.

use crate::Error;
use std::sync::Arc;

/// Receiver of connection lifecycle notices
pub trait ConnectionEvents: Send + Sync {
    /// A session to `host:port` finished its handshake
    fn opened(&self, host: &str, port: u16);

    /// The session was torn down
    fn closed(&self, host: &str, port: u16);

    /// `operation` failed with a transient error and will be replayed after a
    /// reconnect. `attempt` is the 1-based number of the attempt that failed.
    fn retrying(&self, operation: &'static str, attempt: u32, error: &Error);
}

/// Default sink: `tracing` info events tagged with the process id
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl ConnectionEvents for TracingEvents {
    fn opened(&self, host: &str, port: u16) {
        tracing::info!(host, port, pid = std::process::id(), "connection opened");
    }

    fn closed(&self, host: &str, port: u16) {
        tracing::info!(host, port, pid = std::process::id(), "connection closed");
    }

    fn retrying(&self, operation: &'static str, attempt: u32, error: &Error) {
        tracing::info!(
            operation,
            attempt,
            pid = std::process::id(),
            "{}, reconnecting",
            error
        );
    }
}

/// Shared handle to the sink used by default
pub fn tracing_events() -> Arc<dyn ConnectionEvents> {
    Arc::new(TracingEvents)
}
