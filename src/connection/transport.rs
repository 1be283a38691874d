//! Transport: TCP socket setup and the TLS session on top of it

use super::liveness::{self, Liveness};
use super::tls::{parse_server_name, TlsConfig};
use crate::metrics::{counters, labels};
use crate::{Error, Result};
use bytes::Bytes;
use futures::FutureExt;
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// Upper bound on the up-front allocation for a sized read
const READ_CHUNK: usize = 8 * 1024;

/// Open a TCP connection with keepalive and no-delay enabled.
///
/// Makes exactly one connection attempt; retrying is the caller's business.
pub async fn connect_tcp(
    host: &str,
    port: u16,
    keepalive_idle: Option<Duration>,
) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port)).await?;

    let socket = SockRef::from(&stream);
    socket.set_keepalive(true)?;
    if let Some(idle) = keepalive_idle {
        socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
    }
    stream.set_nodelay(true)?;

    Ok(stream)
}

/// An established TLS session to the gateway.
///
/// Owns the TLS stream, which owns the TCP socket, so both are always present
/// or absent together.
pub struct Session {
    stream: BufReader<TlsStream<TcpStream>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer_addr", &self.peer_addr().ok())
            .field("buffered", &self.stream.buffer().len())
            .finish()
    }
}

impl Session {
    /// Perform the TLS handshake over an already connected socket
    pub async fn handshake(tcp: TcpStream, host: &str, tls_config: &TlsConfig) -> Result<Self> {
        let server_name = parse_server_name(host)?;

        let connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(Error::Handshake)?;

        if let Some(version) = stream.get_ref().1.protocol_version() {
            tracing::debug!(?version, "TLS handshake complete");
        }

        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    /// Connect and handshake in one step
    pub async fn open(
        host: &str,
        port: u16,
        keepalive_idle: Option<Duration>,
        tls_config: &TlsConfig,
    ) -> Result<Self> {
        let tcp = match connect_tcp(host, port, keepalive_idle).await {
            Ok(tcp) => tcp,
            Err(e) => {
                counters::open_failed(labels::STAGE_CONNECT);
                return Err(e);
            }
        };

        let session = Self::handshake(tcp, host, tls_config).await;
        if session.is_err() {
            counters::open_failed(labels::STAGE_HANDSHAKE);
        }
        session
    }

    /// The raw TCP socket under the TLS layer
    fn tcp(&self) -> &TcpStream {
        self.stream.get_ref().get_ref().0
    }

    /// Address of the gateway
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// Whether the session still looks usable.
    ///
    /// The TLS layer is polled once without waiting, so records that already
    /// arrived (session tickets, application data, close_notify) are processed
    /// before the socket is peeked. Decrypted bytes stay buffered for the next
    /// read and count as alive.
    pub fn liveness(&mut self) -> Liveness {
        let verdict = match self.stream.fill_buf().now_or_never() {
            Some(Ok(buf)) if buf.is_empty() => Some(Liveness::Dead),
            Some(Ok(_)) => Some(Liveness::Alive),
            Some(Err(e)) => Some(liveness::classify_peek_error(&e)),
            None => None,
        };
        verdict.unwrap_or_else(|| liveness::probe(self.tcp()))
    }

    /// Write all of `data` and flush it to the socket
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(data.len())
    }

    /// Write `data` terminated by a newline
    pub async fn puts(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        if !data.ends_with(b"\n") {
            self.stream.write_all(b"\n").await?;
        }
        self.stream.flush().await
    }

    /// Read `len` bytes, or fewer if the stream ends first
    pub async fn read(&mut self, len: usize) -> io::Result<Bytes> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
        (&mut self.stream).take(len as u64).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Read one line including its trailing newline; `None` at end of stream
    pub async fn gets(&mut self) -> io::Result<Option<Bytes>> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::from(buf)))
    }

    /// Tear the session down.
    ///
    /// The TLS close alert and the TCP shutdown are attempted independently;
    /// neither failure is reported.
    pub async fn close(self) {
        let mut tls = self.stream.into_inner();

        tls.get_mut().1.send_close_notify();
        if let Err(e) = tls.flush().await {
            tracing::debug!(error = %e, "TLS close_notify failed");
        }

        let (mut tcp, _) = tls.into_inner();
        if let Err(e) = tcp.shutdown().await {
            tracing::debug!(error = %e, "TCP shutdown failed");
        }
    }
}
