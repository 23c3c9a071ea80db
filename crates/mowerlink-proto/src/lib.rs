//! Wire framing and layered message codec for the mower fleet protocol.
//!
//! Four layers, leaf to root:
//!
//! - [`frame`]: SOF-delimited, checksummed byte framing (`0xAA | len |
//!   payload | checksum`).
//! - [`session`]: keyed-MAC envelope and message type tag.
//! - [`presentation`]: request/response correlation (IIN).
//! - [`application`]: command byte and command body.
//!
//! Every function here is pure: no I/O, no shared state. Encoding and
//! decoding frames is handled independently of what is inside them, so this
//! crate has no notion of handshakes, authentication, or device state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod application;
pub mod error;
pub mod frame;
pub mod presentation;
pub mod session;
mod varint;

pub use application::ApplicationMessage;
pub use error::ProtocolError;
pub use frame::DecodeOutcome;
pub use presentation::PresentationMessage;
pub use session::{BYPASS_HMAC, MessageType, SessionMessage};
