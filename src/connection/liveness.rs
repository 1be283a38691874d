//! Liveness probing
//!
//! Gateways drop idle connections silently (firewall timeouts, peer restarts)
//! and the local side only finds out on the next I/O. A non-blocking one byte
//! `MSG_PEEK` on the raw socket tells "idle" apart from "gone" without
//! consuming anything or blocking the caller.
//!
//! The session lets its TLS layer process whatever already arrived before
//! falling back to this peek, so unread handshake records never pass for data.
//!
//! The answer is best effort: the peer can hang up right after a successful
//! probe. The retry loop in the connection covers that window.

use socket2::SockRef;
use std::io;
use std::mem::MaybeUninit;
use tokio::net::TcpStream;

/// Outcome of a liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Usable: idle, or data is waiting to be read
    Alive,
    /// Peer closed or reset the connection
    Dead,
}

impl Liveness {
    /// Whether the connection can be used
    pub fn is_alive(self) -> bool {
        self == Liveness::Alive
    }
}

/// Peek one byte without blocking and classify the result.
///
/// tokio sockets are already in non-blocking mode, so the peek returns
/// immediately with either data, EOF, or an error.
pub fn probe(socket: &TcpStream) -> Liveness {
    let mut buf = [MaybeUninit::<u8>::uninit(); 1];
    match SockRef::from(socket).peek(&mut buf) {
        Ok(0) => Liveness::Dead,
        Ok(_) => Liveness::Alive,
        Err(e) => classify_peek_error(&e),
    }
}

/// Map a peek error to a liveness verdict
pub fn classify_peek_error(err: &io::Error) -> Liveness {
    if is_would_block(err) {
        Liveness::Alive
    } else {
        Liveness::Dead
    }
}

/// Whether `err` means "no data yet" rather than a broken connection.
///
/// The structured kind decides whenever it is set. Errors re-wrapped by
/// intermediate layers can lose the kind and keep only the OS text, so the
/// message is checked as a fallback. That fallback is a heuristic: any error
/// whose text mentions "would block" counts as idle.
pub fn is_would_block(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::WouldBlock => true,
        io::ErrorKind::Other => err.to_string().to_ascii_lowercase().contains("would block"),
        _ => false,
    }
}
