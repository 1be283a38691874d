//! Connection metrics
//!
//! Thin wrappers over the `metrics` facade. Nothing is recorded unless the
//! embedding process installs a recorder.

/// Metric names
pub mod names {
    /// Sessions that completed a handshake
    pub const CONNECTIONS_OPENED: &str = "pushlink_connections_opened_total";
    /// Sessions torn down
    pub const CONNECTIONS_CLOSED: &str = "pushlink_connections_closed_total";
    /// Failed open attempts, by stage
    pub const OPEN_FAILURES: &str = "pushlink_open_failures_total";
    /// Operations replayed after a reconnect
    pub const OPERATION_RETRIES: &str = "pushlink_operation_retries_total";
    /// Operations that used up their retry budget
    pub const OPERATIONS_EXHAUSTED: &str = "pushlink_operations_exhausted_total";
}

/// Label values
pub mod labels {
    /// TCP connect (including name resolution)
    pub const STAGE_CONNECT: &str = "connect";
    /// TLS handshake
    pub const STAGE_HANDSHAKE: &str = "handshake";
}

/// Counter helpers
pub mod counters {
    use super::names;

    /// Record a completed handshake
    pub fn connection_opened() {
        metrics::counter!(names::CONNECTIONS_OPENED).increment(1);
    }

    /// Record a teardown
    pub fn connection_closed() {
        metrics::counter!(names::CONNECTIONS_CLOSED).increment(1);
    }

    /// Record a failed open at `stage`
    pub fn open_failed(stage: &'static str) {
        metrics::counter!(names::OPEN_FAILURES, "stage" => stage).increment(1);
    }

    /// Record a replayed operation
    pub fn operation_retried(operation: &'static str) {
        metrics::counter!(names::OPERATION_RETRIES, "operation" => operation).increment(1);
    }

    /// Record an operation that gave up
    pub fn operation_exhausted(operation: &'static str) {
        metrics::counter!(names::OPERATIONS_EXHAUSTED, "operation" => operation).increment(1);
    }
}
