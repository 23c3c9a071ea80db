//! Wire-level error kinds.

/// Failures that can occur while decoding a frame or one of its nested
/// layers.
///
/// All variants except an incomplete-buffer condition (modeled separately as
/// [`crate::frame::DecodeOutcome::Incomplete`], not as an error) are terminal
/// for the current decode attempt: the caller must resynchronize before
/// trying again.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolError {
    /// The byte at the expected start-of-frame position was not `0xAA`.
    #[error("invalid start-of-frame byte: {byte:#04x}")]
    InvalidSof {
        /// The byte that was found instead of the SOF marker.
        byte: u8,
    },

    /// The length varint did not terminate within 3 bytes.
    #[error("length varint exceeds 3 bytes")]
    LengthTooLong,

    /// The two's-complement checksum did not match.
    #[error("checksum mismatch: expected {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch {
        /// Checksum read from the wire.
        expected: u16,
        /// Checksum computed over the received bytes.
        actual: u16,
    },

    /// The declared payload length ran past the end of the supplied buffer
    /// in a context where no more bytes will ever arrive (used by callers
    /// that know the buffer is final, e.g. test vectors).
    #[error("frame shorter than declared length")]
    TruncatedFrame,

    /// A session-layer message was shorter than the minimum 5 bytes
    /// (`hmac[4] | type[1]`).
    #[error("session message shorter than 5 bytes")]
    SessionTooShort,

    /// A presentation-layer message was shorter than the minimum 2 bytes
    /// (`iin[2]`).
    #[error("presentation message shorter than 2 bytes")]
    PresentationTooShort,

    /// An application-layer message was empty (missing the command byte).
    #[error("application message is empty")]
    ApplicationEmpty,

    /// The session message type byte did not match any known type.
    #[error("unknown session message type: {0:#04x}")]
    UnknownMessageType(u8),
}
