//! Bounded reconnect-and-replay for stream operations
//!
//! Every read or write gets its own attempt budget. An attempt fails when the
//! session is missing or dead before the operation starts, or when the
//! operation itself hits a transient error. Between attempts the whole stack is
//! reopened; a reopen that fails is the next attempt's failure.

use super::config::DEFAULT_RETRY_ATTEMPTS;
use crate::events::ConnectionEvents;
use crate::metrics::counters;
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::io;

/// How many times an operation is tried before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` attempts in total (at least one)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Total attempts per operation
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS)
    }
}

/// Something that holds a session and can rebuild it
pub(crate) trait Reconnect {
    type Session;

    /// The session, if one is held and passes the liveness probe
    fn live_session(&mut self) -> Option<&mut Self::Session>;

    /// Tear down and rebuild the session
    fn reconnect(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Run `op` against the target's session under `policy`.
///
/// Non-transient errors are returned as they are. When the budget runs out the
/// last transient error is folded into [`Error::RetriesExhausted`].
pub(crate) async fn run<C, T, F>(
    target: &mut C,
    policy: RetryPolicy,
    events: &dyn ConnectionEvents,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    C: Reconnect,
    F: for<'s> FnMut(&'s mut C::Session) -> BoxFuture<'s, io::Result<T>>,
{
    let mut attempt = 1;
    let mut reconnect = false;

    loop {
        let outcome = if reconnect {
            match target.reconnect().await {
                Ok(()) => attempt_once(target, &mut op).await,
                Err(e) => Err(e),
            }
        } else {
            attempt_once(target, &mut op).await
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => e,
            Err(e) => return Err(e),
        };

        if attempt >= policy.max_attempts() {
            counters::operation_exhausted(operation);
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                message: err.to_string(),
            });
        }

        events.retrying(operation, attempt, &err);
        counters::operation_retried(operation);
        attempt += 1;
        reconnect = true;
    }
}

async fn attempt_once<C, T, F>(target: &mut C, op: &mut F) -> Result<T>
where
    C: Reconnect,
    F: for<'s> FnMut(&'s mut C::Session) -> BoxFuture<'s, io::Result<T>>,
{
    let session = target.live_session().ok_or(Error::ConnectionClosed)?;
    op(session).await.map_err(Error::Io)
}
