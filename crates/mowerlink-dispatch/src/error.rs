//! Error types for the outbound action dispatcher and operator-facing
//! action façade.

use std::io;

use mowerlink_core::HandshakeError;
use mowerlink_proto::ProtocolError;
use thiserror::Error;

/// Errors from [`crate::dispatcher::Dispatcher::dispatch`].
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The device id has no known port in the registry.
    #[error("device {0} is not provisioned")]
    DeviceNotProvisioned(u64),

    /// TCP connect did not complete within the 10s budget.
    #[error("connect to device timed out")]
    ConnectTimeout,

    /// The client-side handshake did not complete within its time budget.
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// No REGULAR reply arrived within the 5s response budget.
    #[error("timed out waiting for device reply")]
    ResponseTimeout,

    /// Wire decode failure while awaiting the reply.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// The device registry could not be read.
    #[error("device registry error: {0}")]
    Registry(#[from] mowerlink_core::RegistryError),
}

/// Errors from the operator-facing action façade ([`crate::facade`]).
#[derive(Error, Debug)]
pub enum FacadeError {
    /// The requested action is not permitted from the device's current
    /// persisted state.
    #[error("action {action} is not permitted from state {current_state:?}")]
    InvalidTransition {
        /// The action that was requested.
        action: String,
        /// The device's current persisted state.
        current_state: mowerlink_core::DeviceState,
    },

    /// The device has no persisted state yet, so no transition can be
    /// evaluated.
    #[error("device {0} has no persisted state")]
    NoPersistedState(u64),

    /// The underlying dispatch to the device failed.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Persisting the new state after a successful dispatch failed.
    #[error("failed to persist new state: {0}")]
    Sink(#[from] mowerlink_core::SinkError),
}
