//! Connection management
//!
//! This module handles:
//! * Configuration and client credentials
//! * TCP socket setup and the TLS session (mutual authentication)
//! * Liveness probing of idle sessions
//! * Reconnect-and-replay of reads and writes

mod config;
mod conn;
mod credentials;
pub mod liveness;
mod retry;
mod state;
mod tls;
mod transport;

pub use config::{
    ConnectionConfig, ConnectionConfigBuilder, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RETRY_ATTEMPTS,
};
pub use conn::Connection;
pub use credentials::Credentials;
pub use liveness::Liveness;
pub use retry::RetryPolicy;
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::{connect_tcp, Session};
