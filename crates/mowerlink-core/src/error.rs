//! Error types for the handshake state machine.
//!
//! We avoid using `std::io::Error` for protocol logic to maintain type safety
//! and enable proper error handling and recovery; transport errors are
//! folded in at the boundary via `From`.

use std::{io, time::Duration};

use thiserror::Error;

use crate::handshake::Phase;

/// Errors that can occur while driving the handshake state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// A message arrived whose type does not belong in the current phase
    /// (e.g. a CLIENT_AUTH before a HELLO was ever sent).
    #[error("unexpected message type {msg_type:#04x} in phase {phase:?}")]
    UnexpectedMessage {
        /// Current phase when the message arrived.
        phase: Phase,
        /// Session message type tag that was received.
        msg_type: u8,
    },

    /// The peer's authenticator did not match the one we computed.
    #[error("handshake authenticator verification failed")]
    VerifyFailed,

    /// No reply arrived within the handshake's 500ms-per-hop budget.
    #[error("handshake timed out after {elapsed:?}")]
    AuthTimeout {
        /// How long we waited before giving up.
        elapsed: Duration,
    },

    /// A handshake message body was too short to contain its fields.
    #[error("malformed handshake message: {0}")]
    Malformed(String),

    /// Underlying wire-protocol decode error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport (socket) error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl HandshakeError {
    /// Returns true if this error is transient (retrying the same exchange
    /// might succeed). Protocol violations and failed verification are never
    /// transient — they indicate a broken or malicious peer and the
    /// connection must be closed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AuthTimeout { .. })
    }
}

impl From<mowerlink_proto::ProtocolError> for HandshakeError {
    fn from(err: mowerlink_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<io::Error> for HandshakeError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
