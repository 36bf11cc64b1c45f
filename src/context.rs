//! The single exclusively-owned bundle of mutable core state.
//!
//! Everything the control loop mutates lives here and is passed by
//! reference into the scheduler, navigator and calibration engine;
//! there are no free-standing globals. Any externally-driven context
//! (e.g. a network request handler) that touches this structure must
//! hand its mutations into the loop, or hold them behind a short
//! critical section at whole-structure granularity.

use crate::cal::{self, EcCal, LevelCal};
use crate::net::{self, MqttConfig, MqttStatus, WifiStatus};
use crate::sensors::SensorReadings;
use crate::store::KvStore;
use crate::ui::navigator::Screen;

/// All mutable device state, created once at boot.
#[derive(Debug)]
pub struct DeviceContext {
    pub screen: Screen,
    pub backlight: bool,
    pub ec_cal: EcCal,
    pub level_cal: LevelCal,
    pub readings: SensorReadings,
    pub wifi: WifiStatus,
    pub mqtt_cfg: MqttConfig,
    pub mqtt: MqttStatus,
}

impl DeviceContext {
    /// Load persisted records (defaults if absent) and start on the
    /// home screen with the backlight on.
    pub fn boot<S: KvStore>(store: &mut S) -> Self {
        let ec_cal = cal::load_ec(store);
        let level_cal = cal::load_level(store);
        let mqtt_cfg = net::load_mqtt_config(store);

        Self {
            screen: Screen::Home,
            backlight: true,
            ec_cal,
            level_cal,
            readings: SensorReadings::default(),
            wifi: WifiStatus::default(),
            mqtt_cfg,
            mqtt: MqttStatus::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[test]
    fn boot_starts_at_home_with_defaults() {
        let mut store = MemStore::new();
        let ctx = DeviceContext::boot(&mut store);

        assert_eq!(ctx.screen, Screen::Home);
        assert!(ctx.backlight);
        assert!(!ctx.ec_cal.valid);
        assert!(!ctx.level_cal.valid);
        assert!(!ctx.mqtt_cfg.enabled);
        assert_eq!(ctx.mqtt_cfg.base_topic.as_str(), "hydronode");
    }
}
