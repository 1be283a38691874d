//! Connection state

/// Externally visible connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session: never opened, explicitly closed, or a reopen failed
    Closed,

    /// Handshake completed and the session has not been torn down
    Open,
}

impl ConnectionState {
    /// Whether a session is held
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}
