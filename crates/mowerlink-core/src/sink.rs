//! Telemetry sink: the core's only shared mutable external dependency.
//!
//! Connection tasks never touch storage directly; they call through this
//! trait. Implementations must be safe to call concurrently from many
//! connection tasks at once, since every accepted socket runs in its own
//! task and they all share one sink handle.

use async_trait::async_trait;

use crate::device::DeviceState;

/// Severity of a logged lifecycle event, matching the three levels named in
/// the connection-session event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine lifecycle event.
    Information,
    /// Recoverable anomaly.
    Warning,
    /// Connection-ending or data-loss anomaly.
    Error,
}

/// A failure writing to the telemetry sink's backing store.
///
/// Sink errors never propagate out of a connection task: callers log them
/// at [`Severity::Error`] and continue.
#[derive(Debug, Clone, thiserror::Error)]
#[error("telemetry sink error: {0}")]
pub struct SinkError(pub String);

/// External storage abstraction the core writes battery, position, state,
/// and log events to.
///
/// Implementations must be `Clone + Send + Sync`: the same handle is passed
/// to every connection task, and clones are expected to share the same
/// underlying store (e.g. via an internal `Arc`).
#[async_trait]
pub trait TelemetrySink: Clone + Send + Sync + 'static {
    /// Record a battery reading. `percent` is in `[0, 100]`.
    async fn record_battery(
        &self,
        device_id: u64,
        percent: f32,
        ts: u64,
    ) -> Result<(), SinkError>;

    /// Record a GPS position reading.
    async fn record_position(
        &self,
        device_id: u64,
        latitude: f32,
        longitude: f32,
        ts: u64,
    ) -> Result<(), SinkError>;

    /// Record a device state transition.
    async fn record_state(
        &self,
        device_id: u64,
        state: DeviceState,
        ts: u64,
    ) -> Result<(), SinkError>;

    /// Record a lifecycle/protocol log line.
    async fn record_log(
        &self,
        device_id: u64,
        severity: Severity,
        event_type: &str,
        message: &str,
        ts: u64,
    ) -> Result<(), SinkError>;

    /// Record a blade-time reset event.
    ///
    /// Optional: the reset-blade-time command has no corresponding sink call
    /// in the system this protocol was distilled from. The default
    /// implementation is a no-op; implementers that want to track blade
    /// resets can override it.
    async fn record_blade_reset(&self, _device_id: u64, _ts: u64) -> Result<(), SinkError> {
        Ok(())
    }
}
