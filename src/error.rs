//! Unified error type for hydronode.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! No condition here is fatal: the device must stay responsive to
//! button input with every peripheral failing.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Calibration
    /// Two-point fit is degenerate (voltage separation below epsilon).
    /// Non-fatal; the fallback conversion stays in effect.
    InvalidCalibration,

    /// Persisted record missing or unreadable at boot; defaults apply.
    StalePersistence,

    // Sensors
    /// Reading outside the plausible physical range; discarded.
    SensorOutOfRange,

    // Network
    /// WiFi down or AP mode; dependent tasks skip this cycle.
    NetworkUnavailable,

    /// MQTT transport error (connect or publish).
    Mqtt,

    // Persistence
    /// Key-value store read/write/commit failed. Best effort, not
    /// retried within the loop.
    Storage,

    // UI
    /// Display transaction failed.
    Display,
}

impl Error {
    /// Short stable label, used in status payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Error::InvalidCalibration => "invalid_calibration",
            Error::StalePersistence => "stale_persistence",
            Error::SensorOutOfRange => "sensor_out_of_range",
            Error::NetworkUnavailable => "network_unavailable",
            Error::Mqtt => "mqtt",
            Error::Storage => "storage",
            Error::Display => "display",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
