//! In-memory [`DeviceRegistry`] and [`TelemetrySink`] implementations.
//!
//! Used by the binary when no external registry/storage is wired in, and by
//! integration tests. A real deployment is expected to supply its own
//! implementations backed by a config file and a database; those live
//! outside this crate's scope.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use mowerlink_core::{
    DeviceRegistry, DeviceState, ProvisionedDevice, RegistryError, Severity, SinkError,
    TelemetrySink,
};

/// A fixed, in-memory set of provisioned devices.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    devices: Arc<Vec<ProvisionedDevice>>,
}

impl MemoryRegistry {
    /// Build a registry from a fixed device list.
    #[must_use]
    pub fn new(devices: Vec<ProvisionedDevice>) -> Self {
        Self { devices: Arc::new(devices) }
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn list_provisioned_devices(&self) -> Result<Vec<ProvisionedDevice>, RegistryError> {
        Ok(self.devices.as_ref().clone())
    }

    fn get_device(&self, device_id: u64) -> Result<Option<ProvisionedDevice>, RegistryError> {
        Ok(self.devices.iter().find(|d| d.device_id == device_id).cloned())
    }
}

/// The latest telemetry recorded for one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceTelemetry {
    /// Last reported battery percentage, if any.
    pub battery_percent: Option<f32>,
    /// Last reported position, if any.
    pub position: Option<(f32, f32)>,
    /// Last reported or persisted state, if any.
    pub state: Option<DeviceState>,
}

/// A `Mutex`-guarded in-memory telemetry sink, keyed by device id.
///
/// Mirrors the source's stateless-singleton-with-one-real-backing-store
/// shape, with the store replaced by a `HashMap` instead of a database
/// handle.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<HashMap<u64, DeviceTelemetry>>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the telemetry currently recorded for `device_id`.
    #[must_use]
    pub fn snapshot(&self, device_id: u64) -> Option<DeviceTelemetry> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&device_id).cloned()
    }
}

#[async_trait::async_trait]
impl TelemetrySink for MemorySink {
    async fn record_battery(
        &self,
        device_id: u64,
        percent: f32,
        _ts: u64,
    ) -> Result<(), SinkError> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.entry(device_id).or_default().battery_percent = Some(percent);
        Ok(())
    }

    async fn record_position(
        &self,
        device_id: u64,
        latitude: f32,
        longitude: f32,
        _ts: u64,
    ) -> Result<(), SinkError> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.entry(device_id).or_default().position = Some((latitude, longitude));
        Ok(())
    }

    async fn record_state(
        &self,
        device_id: u64,
        state: DeviceState,
        _ts: u64,
    ) -> Result<(), SinkError> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.entry(device_id).or_default().state = Some(state);
        Ok(())
    }

    async fn record_log(
        &self,
        device_id: u64,
        severity: Severity,
        event_type: &str,
        message: &str,
        _ts: u64,
    ) -> Result<(), SinkError> {
        match severity {
            Severity::Information => tracing::info!(device_id, event_type, message),
            Severity::Warning => tracing::warn!(device_id, event_type, message),
            Severity::Error => tracing::error!(device_id, event_type, message),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_looks_up_known_device() {
        let registry = MemoryRegistry::new(vec![ProvisionedDevice {
            device_id: 1,
            display_name: "Mower 1".to_string(),
            serial: "SN-1".to_string(),
            port: 9001,
        }]);

        assert_eq!(registry.get_device(1).unwrap().map(|d| d.port), Some(9001));
        assert_eq!(registry.get_device(2).unwrap(), None);
    }

    #[tokio::test]
    async fn sink_records_state_per_device() {
        let sink = MemorySink::new();
        sink.record_state(1, DeviceState::Mowing, 0).await.unwrap();
        sink.record_battery(1, 87.5, 0).await.unwrap();

        let snapshot = sink.snapshot(1).unwrap();
        assert_eq!(snapshot.state, Some(DeviceState::Mowing));
        assert_eq!(snapshot.battery_percent, Some(87.5));
        assert!(sink.snapshot(2).is_none());
    }
}
