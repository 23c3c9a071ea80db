//! Application layer: `command[1] | body[*]`.

use bytes::Bytes;

use crate::error::ProtocolError;

/// A decoded application-layer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationMessage {
    /// Command byte. Requests use `0x00..=0x03`; responses set the high
    /// bit of the request command they answer; `0xFF` is the error
    /// command.
    pub command: u8,
    /// Command-specific body.
    pub body: Bytes,
}

/// Build an application-layer message: `[command] ++ body`.
pub fn pack(command: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(command);
    out.extend_from_slice(body);
    out
}

/// Parse an application-layer message.
///
/// # Errors
///
/// Returns [`ProtocolError::ApplicationEmpty`] if `bytes` is empty.
pub fn unpack(bytes: &[u8]) -> Result<ApplicationMessage, ProtocolError> {
    let (&command, body) = bytes.split_first().ok_or(ProtocolError::ApplicationEmpty)?;
    Ok(ApplicationMessage { command, body: Bytes::copy_from_slice(body) })
}
