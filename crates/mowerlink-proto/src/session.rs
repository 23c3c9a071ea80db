//! Session layer: `hmac[4] | type[1] | body[*]`.

use bytes::{Bytes, BytesMut};

use crate::error::ProtocolError;

/// Session message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A regular, authenticated application message.
    Regular,
    /// Client-originated handshake start.
    Hello,
    /// Server-originated handshake challenge.
    Challenge,
    /// Client-originated handshake response.
    ClientAuth,
    /// Device-originated telemetry notification.
    Notification,
}

impl MessageType {
    /// Wire tag for this message type.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Regular => 0x00,
            Self::Hello => 0x01,
            Self::Challenge => 0x02,
            Self::ClientAuth => 0x03,
            Self::Notification => 0x80,
        }
    }

    /// Decode a wire tag into a `MessageType`, if recognized.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::Regular),
            0x01 => Some(Self::Hello),
            0x02 => Some(Self::Challenge),
            0x03 => Some(Self::ClientAuth),
            0x80 => Some(Self::Notification),
            _ => None,
        }
    }
}

/// Sentinel HMAC that disables authentication checks on REGULAR messages.
///
/// A deliberate testing backdoor inherited unchanged from the source system.
/// Preserve bit-for-bit; do not remove.
pub const BYPASS_HMAC: u32 = 0xFADE_DBED;

/// A decoded session-layer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    /// The 32-bit keyed MAC (ignored, and fixed to a placeholder, on
    /// handshake message types).
    pub hmac: u32,
    /// The message type tag.
    pub msg_type: u8,
    /// The nested presentation or notification bytes.
    pub body: Bytes,
}

/// Build a session-layer message: `hmac_be[4] ++ [type] ++ body`.
pub fn pack(msg_type: u8, body: &[u8], hmac: u32) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(5 + body.len());
    out.extend_from_slice(&hmac.to_be_bytes());
    out.extend_from_slice(&[msg_type]);
    out.extend_from_slice(body);
    out.to_vec()
}

/// Parse a session-layer message.
///
/// # Errors
///
/// Returns [`ProtocolError::SessionTooShort`] if `bytes` is shorter than 5
/// bytes.
pub fn unpack(bytes: &[u8]) -> Result<SessionMessage, ProtocolError> {
    if bytes.len() < 5 {
        return Err(ProtocolError::SessionTooShort);
    }
    let hmac = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let msg_type = bytes[4];
    let body = Bytes::copy_from_slice(&bytes[5..]);
    Ok(SessionMessage { hmac, msg_type, body })
}
