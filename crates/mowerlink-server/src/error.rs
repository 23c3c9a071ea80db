//! Error types for the connection session and listener supervisor.

use std::io;

use mowerlink_core::HandshakeError;
use mowerlink_proto::ProtocolError;
use thiserror::Error;

/// Errors that can terminate a single connection session.
///
/// None of these propagate beyond the connection task: the session logs
/// them and tears down its own socket.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Wire encode failure while building an outbound response. Inbound
    /// decode failures (malformed frame, session, presentation, or
    /// application bytes) never reach this variant: [`session::Session`]
    /// logs them and keeps the connection open, per the error table's
    /// log-and-continue policy for every decode kind except
    /// [`HandshakeError::VerifyFailed`].
    ///
    /// [`session::Session`]: crate::session::Session
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Handshake failed (bad authenticator, unexpected message, or timeout).
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Socket I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// No bytes received for the inactivity window.
    #[error("connection timed out")]
    InactivityTimeout,
}

impl SessionError {
    /// Returns true if this error reflects an ordinary, expected end of
    /// connection rather than a protocol violation worth escalating.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InactivityTimeout)
            || matches!(self, Self::Handshake(e) if e.is_transient())
    }
}
