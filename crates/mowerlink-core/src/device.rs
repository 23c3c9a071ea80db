//! Canonical device state and its wire-code mapping.

/// The state a mower device reports, and the backend persists, via
/// notifications and control-command side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Docked and charging.
    StationCharging,
    /// Docked, charge complete.
    StationChargingCompleted,
    /// Actively mowing.
    Mowing,
    /// Driving back to the charging station.
    ReturningToStation,
    /// Stopped by a stop/acknowledge-error command.
    Paused,
    /// Reporting a fault.
    Error,
}

impl DeviceState {
    /// Wire code for this state, as used in device-status notifications.
    #[must_use]
    pub const fn wire_code(self) -> u8 {
        match self {
            Self::StationCharging => 0x00,
            Self::StationChargingCompleted => 0x01,
            Self::Mowing => 0x02,
            Self::ReturningToStation => 0x03,
            Self::Paused => 0x04,
            Self::Error => 0x80,
        }
    }

    /// Decode a wire code into a `DeviceState`, if recognized.
    #[must_use]
    pub const fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::StationCharging),
            0x01 => Some(Self::StationChargingCompleted),
            0x02 => Some(Self::Mowing),
            0x03 => Some(Self::ReturningToStation),
            0x04 => Some(Self::Paused),
            0x80 => Some(Self::Error),
            _ => None,
        }
    }

    /// Name used in telemetry sink calls and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StationCharging => "StationCharging",
            Self::StationChargingCompleted => "StationChargingCompleted",
            Self::Mowing => "Mowing",
            Self::ReturningToStation => "ReturningToStation",
            Self::Paused => "Paused",
            Self::Error => "Error",
        }
    }
}
