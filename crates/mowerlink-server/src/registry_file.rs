//! Loads a [`MemoryRegistry`] from a JSON device registry file.
//!
//! The file format is deliberately the simplest thing that could work: a
//! flat JSON array of provisioned devices. A production deployment's real
//! registry (backed by the operator's own database) is out of scope; this
//! exists so the binary has something to load at start-up without one.

use std::path::Path;

use mowerlink_core::ProvisionedDevice;
use serde::Deserialize;
use thiserror::Error;

use crate::memory::MemoryRegistry;

/// Failure reading or parsing a device registry file.
#[derive(Error, Debug)]
pub enum RegistryFileError {
    /// The file could not be read.
    #[error("failed to read registry file {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file's contents were not valid JSON, or did not match the
    /// expected shape.
    #[error("failed to parse registry file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RegistryFileEntry {
    device_id: u64,
    display_name: String,
    serial: String,
    port: u16,
}

/// Load provisioned devices from a JSON file and build a [`MemoryRegistry`]
/// over them.
pub fn load_registry(path: &Path) -> Result<MemoryRegistry, RegistryFileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RegistryFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let entries: Vec<RegistryFileEntry> =
        serde_json::from_str(&contents).map_err(|source| RegistryFileError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    let devices = entries
        .into_iter()
        .map(|entry| ProvisionedDevice {
            device_id: entry.device_id,
            display_name: entry.display_name,
            serial: entry.serial,
            port: entry.port,
        })
        .collect();

    Ok(MemoryRegistry::new(devices))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use mowerlink_core::DeviceRegistry;

    use super::*;

    #[test]
    fn loads_devices_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"device_id": 1, "display_name": "Mower 1", "serial": "SN-1", "port": 9001}}]"#
        )
        .unwrap();

        let registry = load_registry(file.path()).unwrap();
        let devices = registry.list_provisioned_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].port, 9001);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_registry(Path::new("/nonexistent/registry.json"));
        assert!(matches!(result, Err(RegistryFileError::Read { .. })));
    }
}
