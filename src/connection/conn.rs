//! Core connection type

use super::config::ConnectionConfig;
use super::credentials::Credentials;
use super::retry::{self, Reconnect, RetryPolicy};
use super::state::ConnectionState;
use super::tls::TlsConfig;
use super::transport::Session;
use crate::events::{self, ConnectionEvents};
use crate::metrics::counters;
use crate::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

/// Persistent TLS connection to a push gateway.
///
/// Opens on construction. Reads and writes check that the session is still
/// alive, and on transient failures reconnect and replay the call up to the
/// configured number of attempts.
///
/// A `Connection` is meant for one caller at a time; every operation takes
/// `&mut self`. Share it behind a `tokio::sync::Mutex` or give it its own task.
pub struct Connection {
    config: ConnectionConfig,
    tls: TlsConfig,
    session: Option<Session>,
    retry: RetryPolicy,
    events: Arc<dyn ConnectionEvents>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state())
            .field("retry", &self.retry)
            .finish()
    }
}

impl Connection {
    /// Validate `config`, load credentials, and open the connection.
    ///
    /// Lifecycle notices go to `tracing`.
    ///
    /// # Errors
    ///
    /// Configuration and credential problems are reported before any socket is
    /// opened. A failed connect or handshake is returned as-is; the
    /// constructor does not retry.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        Self::connect_with_events(config, events::tracing_events()).await
    }

    /// Like [`connect`](Self::connect), reporting lifecycle notices to `events`
    pub async fn connect_with_events(
        config: ConnectionConfig,
        events: Arc<dyn ConnectionEvents>,
    ) -> Result<Self> {
        let mut conn = Self::new(config, events)?;
        conn.open().await?;
        Ok(conn)
    }

    /// Build an unopened connection
    fn new(config: ConnectionConfig, events: Arc<dyn ConnectionEvents>) -> Result<Self> {
        config.validate()?;

        let credentials = Credentials::load(config.certificate_path()?)?;
        let mut tls = TlsConfig::builder(credentials);
        if let Some(ca_cert) = &config.ca_cert {
            tls = tls.ca_cert_path(ca_cert);
        }
        let tls = tls.build()?;

        tracing::info!(
            certificate = %config.certificate_path()?.display(),
            fingerprint = tls.fingerprint(),
            "loaded client certificate"
        );

        Ok(Self {
            retry: RetryPolicy::new(config.retry_attempts),
            config,
            tls,
            session: None,
            events,
        })
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Attempt budget applied to each read or write
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        if self.session.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Address of the gateway, while a session is held
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref()?.peer_addr().ok()
    }

    /// Open the connection if no session is held.
    ///
    /// A held session is kept as it is, without a new handshake.
    pub async fn open(&mut self) -> Result<&mut Self> {
        if self.session.is_some() {
            return Ok(self);
        }

        let host = self.config.host.clone();
        let port = self.config.port;

        let session = Session::open(&host, port, self.config.keepalive_idle, &self.tls)
            .instrument(tracing::info_span!("open", host = %host, port))
            .await?;

        self.session = Some(session);
        counters::connection_opened();
        self.events.opened(&host, port);

        Ok(self)
    }

    /// Close the connection.
    ///
    /// Never fails: teardown errors are logged at debug level and dropped. The
    /// connection can be opened again afterwards.
    pub async fn close(&mut self) -> &mut Self {
        if let Some(session) = self.session.take() {
            session.close().await;
            counters::connection_closed();
            self.events.closed(&self.config.host, self.config.port);
        }
        self
    }

    /// Close, then open
    pub async fn reopen(&mut self) -> Result<&mut Self> {
        self.close().await;
        self.open().await
    }

    /// Whether the connection is usable: a session is held and the peer has
    /// not gone away
    pub fn is_open(&mut self) -> bool {
        !self.is_closed()
    }

    /// Whether the connection is unusable: no session, or the liveness probe
    /// saw the peer close or reset it
    pub fn is_closed(&mut self) -> bool {
        match &mut self.session {
            Some(session) => !session.liveness().is_alive(),
            None => true,
        }
    }

    /// Write all of `data`, returning the number of bytes written
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let data = Bytes::copy_from_slice(data);
        self.with_retries("write", move |session| {
            let data = data.clone();
            async move { session.write(&data).await }.boxed()
        })
        .await
    }

    /// Write `data` followed by a newline (unless it already ends in one)
    pub async fn puts(&mut self, data: &[u8]) -> Result<()> {
        let data = Bytes::copy_from_slice(data);
        self.with_retries("puts", move |session| {
            let data = data.clone();
            async move { session.puts(&data).await }.boxed()
        })
        .await
    }

    /// Read `len` bytes, or fewer if the gateway closes the stream first
    pub async fn read(&mut self, len: usize) -> Result<Bytes> {
        self.with_retries("read", move |session| session.read(len).boxed())
            .await
    }

    /// Read one line including the newline; `None` at end of stream
    pub async fn gets(&mut self) -> Result<Option<Bytes>> {
        self.with_retries("gets", |session| session.gets().boxed())
            .await
    }

    async fn with_retries<T, F>(&mut self, operation: &'static str, op: F) -> Result<T>
    where
        F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, std::io::Result<T>>,
    {
        let events = Arc::clone(&self.events);
        let policy = self.retry;
        retry::run(self, policy, events.as_ref(), operation, op).await
    }
}

impl Reconnect for Connection {
    type Session = Session;

    fn live_session(&mut self) -> Option<&mut Session> {
        if self.is_closed() {
            return None;
        }
        self.session.as_mut()
    }

    fn reconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            self.reopen().await?;
            Ok(())
        }
        .boxed()
    }
}
