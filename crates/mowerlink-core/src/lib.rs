//! Core protocol logic for the mower fleet backend: the handshake state
//! machine and the abstractions (environment, device state, telemetry sink,
//! device registry) that both the server and the operator-facing dispatcher
//! build on.
//!
//! Everything here is sans-IO: no module in this crate opens a socket or
//! reads a clock directly. [`env::Environment`] is the only seam to the
//! outside world, and it is injected by the caller.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod device;
pub mod env;
pub mod error;
pub mod handshake;
pub mod registry;
pub mod sink;

pub use device::DeviceState;
pub use env::Environment;
pub use error::HandshakeError;
pub use handshake::{Handshake, HandshakeAction, Phase};
pub use registry::{DeviceRegistry, ProvisionedDevice, RegistryError};
pub use sink::{Severity, SinkError, TelemetrySink};
