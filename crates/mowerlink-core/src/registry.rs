//! Device registry: the inbound contract the core uses to discover which
//! devices it should listen for, and which port each lives on.

use thiserror::Error;

/// A provisioned device and the port its dedicated listener binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedDevice {
    /// Unique device identifier.
    pub device_id: u64,
    /// Human-readable name shown to operators.
    pub display_name: String,
    /// Manufacturer serial number.
    pub serial: String,
    /// TCP port this device's listener binds to.
    pub port: u16,
}

/// Failure reading the device registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("device registry error: {0}")]
pub struct RegistryError(pub String);

/// External registry of provisioned devices, queried at start-up by the
/// listener supervisor and per-dispatch by the action dispatcher.
///
/// Synchronous and `Clone + Send + Sync`, matching the core's preference for
/// small, cheaply-shared handles over async round-trips for what is
/// expected to be local, rarely-changing configuration data.
pub trait DeviceRegistry: Clone + Send + Sync + 'static {
    /// All devices the backend should run a listener for.
    fn list_provisioned_devices(&self) -> Result<Vec<ProvisionedDevice>, RegistryError>;

    /// Look up a single device by id. `Ok(None)` if unknown.
    fn get_device(&self, device_id: u64) -> Result<Option<ProvisionedDevice>, RegistryError>;
}
