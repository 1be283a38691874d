//! pushlink: a resilient TLS client connection to push notification gateways.
//!
//! A [`Connection`](connection::Connection) keeps one mutually-authenticated TLS
//! session open to a gateway (by default `gateway.push.apple.com:2195`),
//! notices when the peer has silently gone away, and reconnects and replays
//! reads and writes that fail for transient reasons.
//!
//! ```no_run
//! # async fn example() -> pushlink::Result<()> {
//! use pushlink::connection::{Connection, ConnectionConfig};
//!
//! let config = ConnectionConfig::builder()
//!     .certificate("/etc/push/apns.pem")
//!     .build()?;
//!
//! let mut conn = Connection::connect(config).await?;
//! conn.write(b"frame").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod connection;
pub mod events;
pub mod metrics;

mod error;

pub use error::{Error, Result};
