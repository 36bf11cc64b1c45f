//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, calibration
//! thresholds and persistence keys live here so they can be tuned
//! in one place.

/// Firmware version string reported in status payloads.
pub const FW_VERSION: &str = "ver-2.1.2";

/// Status/config payload API version.
pub const API_VERSION: u8 = 1;

// GPIO pin assignments (ESP32-C3 SuperMini)
//
// These are logical names; the concrete ESP-IDF drivers are
// constructed in `main.rs`. Adjust for your custom PCB.
//
//   I²C SDA (LCD)     → GPIO8
//   I²C SCL (LCD)     → GPIO9
//   EC analog in      → GPIO0
//   Level analog in   → GPIO1
//   Button MODE       → GPIO2 (to GND, pull-up)
//   Button UP         → GPIO3 (to GND, pull-up)
//   Button ENTER      → GPIO4 (to GND, pull-up)
//   DS18B20 data      → GPIO5

/// PCF8574 backpack I²C address for the 20x4 character LCD.
pub const LCD_ADDR: u8 = 0x27;

/// Physical LCD geometry.
pub const LCD_COLS: usize = 20;
pub const LCD_ROWS: usize = 4;

// Scheduler periods

/// Sensor-sampling task period (ms).
pub const TICK_SENSOR_MS: u64 = 250;

/// Render task period (ms).
pub const TICK_RENDER_MS: u64 = 100;

/// Network-maintenance/publish task period (ms).
pub const TICK_NET_MS: u64 = 200;

// Button press classification
//
// Classification is release-triggered, so the caller must poll at
// least every ~20 ms for durations to resolve correctly.

/// Minimum press duration (ms); anything shorter is contact bounce.
pub const PRESS_SHORT_MS: u64 = 60;

/// Lower bound of a long press (ms).
pub const PRESS_LONG_MS: u64 = 700;

/// Lower bound of a very long press (ms).
pub const PRESS_VERY_LONG_MS: u64 = 3500;

// ADC / analog front end

/// Number of raw samples averaged per sensor reading.
pub const ADC_SAMPLES_PER_READ: u16 = 16;

/// Full-scale raw ADC count (12-bit).
pub const ADC_MAX_COUNT: f32 = 4095.0;

/// ADC reference voltage at the pin (V).
pub const ADC_REF_VOLTS: f32 = 3.3;

/// External divider ratios from probe output to ADC pin.
pub const EC_DIVIDER_RATIO: f32 = 2.0;
pub const LEVEL_DIVIDER_RATIO: f32 = 2.0;

// Calibration

/// Minimum voltage separation between the two EC points (V).
pub const EC_EPSILON_VOLTS: f32 = 0.02;

/// Minimum voltage separation between the two level points (V).
pub const LEVEL_EPSILON_VOLTS: f32 = 0.05;

/// Uncalibrated EC fallback gain (µS/cm per volt).
pub const EC_FALLBACK_US_PER_VOLT: f32 = 10_000.0;

/// Default EC reference solutions (µS/cm).
pub const EC_DEFAULT_REF_A: f32 = 1413.0;
pub const EC_DEFAULT_REF_B: f32 = 27_600.0;

/// Hard floor for the user-editable custom level maximum.
pub const LEVEL_CUSTOM_MAX_FLOOR: f32 = 1.0;

/// Default custom level maximum.
pub const LEVEL_CUSTOM_MAX_DEFAULT: f32 = 100.0;

// Temperature plausibility window (DS18B20 electrical limits, °C).
pub const TEMP_PLAUSIBLE_MIN_C: f32 = -55.0;
pub const TEMP_PLAUSIBLE_MAX_C: f32 = 125.0;

// Network policy

/// Minimum spacing between MQTT reconnect attempts (ms).
pub const MQTT_RETRY_INTERVAL_MS: u64 = 15_000;

/// Default MQTT publish period (ms).
pub const MQTT_DEFAULT_PUB_PERIOD_MS: u16 = 1000;

/// Default MQTT topic prefix.
pub const MQTT_DEFAULT_BASE_TOPIC: &str = "hydronode";

/// STA association window at boot before falling back to the setup AP (ms).
pub const WIFI_STA_BOOT_TIMEOUT_MS: u64 = 8_000;

/// SSID advertised by the provisioning access point.
pub const WIFI_SETUP_AP_SSID: &str = "HydroNode-Setup";

// Persistence namespaces and record versioning

pub const NS_WIFI: &str = "wifi";
pub const NS_MQTT: &str = "mqtt";
pub const NS_EC_CAL: &str = "eccal";
pub const NS_LEVEL_CAL: &str = "lvlcal";

/// Version stamped into each persisted calibration record. A record
/// with a different version is treated as absent at boot.
pub const CAL_RECORD_VERSION: u8 = 1;
