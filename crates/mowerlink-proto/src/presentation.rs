//! Presentation layer: `iin[2 big-endian] | app[*]`.

use bytes::Bytes;

use crate::error::ProtocolError;

/// A decoded presentation-layer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationMessage {
    /// Instance identification number: the request/response correlator.
    pub iin: u16,
    /// The nested application-layer bytes.
    pub body: Bytes,
}

/// Build a presentation-layer message: `iin_be[2] ++ body`.
pub fn pack(iin: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + body.len());
    out.extend_from_slice(&iin.to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Parse a presentation-layer message.
///
/// # Errors
///
/// Returns [`ProtocolError::PresentationTooShort`] if `bytes` is shorter
/// than 2 bytes.
pub fn unpack(bytes: &[u8]) -> Result<PresentationMessage, ProtocolError> {
    if bytes.len() < 2 {
        return Err(ProtocolError::PresentationTooShort);
    }
    let iin = u16::from_be_bytes([bytes[0], bytes[1]]);
    let body = Bytes::copy_from_slice(&bytes[2..]);
    Ok(PresentationMessage { iin, body })
}
