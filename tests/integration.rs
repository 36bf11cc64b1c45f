//! Full control-loop tests: scheduler, navigator, calibration engine
//! and persistence wired together against in-memory fakes.

use hydronode::cal;
use hydronode::config::NS_WIFI;
use hydronode::net::{MqttConfig, NetworkLink, WifiStatus};
use hydronode::sensors::{Channel, SensorSource};
use hydronode::store::{KvStore, MemStore};
use hydronode::ui::navigator::Screen;
use hydronode::ui::{ButtonId, DisplayLines, Press};
use hydronode::{ButtonInput, DeviceContext, NavAction, Scheduler};

#[derive(Default)]
struct FakeButtons {
    down: [bool; 3],
}

impl ButtonInput for FakeButtons {
    fn is_pressed(&mut self, id: ButtonId) -> bool {
        self.down[id as usize]
    }
}

struct FakeSource {
    ec_raw: u16,
    level_raw: u16,
    temp: Option<f32>,
}

impl SensorSource for FakeSource {
    fn read_raw(&mut self, channel: Channel) -> u16 {
        match channel {
            Channel::Ec => self.ec_raw,
            Channel::Level => self.level_raw,
        }
    }

    fn read_temp_c(&mut self) -> Option<f32> {
        self.temp
    }
}

#[derive(Default)]
struct FakeDisplay {
    lines: [String; 4],
}

impl DisplayLines for FakeDisplay {
    fn set_line(&mut self, row: u8, text: &str) {
        self.lines[row as usize] = text.to_string();
    }

    fn set_backlight(&mut self, _on: bool) {}
}

#[derive(Default)]
struct OfflineLink;

impl NetworkLink for OfflineLink {
    fn wifi_status(&mut self) -> WifiStatus {
        WifiStatus::default()
    }

    fn mqtt_is_connected(&mut self) -> bool {
        false
    }

    fn mqtt_connect(&mut self, _cfg: &MqttConfig) -> hydronode::Result<()> {
        Ok(())
    }

    fn publish(&mut self, _topic: &str, _payload: &str, _retain: bool) -> hydronode::Result<()> {
        Ok(())
    }
}

struct Device {
    scheduler: Scheduler,
    ctx: DeviceContext,
    buttons: FakeButtons,
    source: FakeSource,
    display: FakeDisplay,
    link: OfflineLink,
    store: MemStore,
    now_ms: u64,
}

impl Device {
    fn boot() -> Self {
        let mut store = MemStore::new();
        let ctx = DeviceContext::boot(&mut store);
        Self {
            scheduler: Scheduler::new(),
            ctx,
            buttons: FakeButtons::default(),
            source: FakeSource {
                ec_raw: 0,
                level_raw: 0,
                temp: None,
            },
            display: FakeDisplay::default(),
            link: OfflineLink,
            store,
            now_ms: 0,
        }
    }

    fn tick(&mut self) -> NavAction {
        self.scheduler.run_once(
            self.now_ms,
            &mut self.ctx,
            &mut self.buttons,
            &mut self.source,
            &mut self.display,
            &mut self.link,
            &mut self.store,
        )
    }

    /// Advance time, ticking every 10 ms like the firmware loop.
    fn run_for(&mut self, ms: u64) -> NavAction {
        let end = self.now_ms + ms;
        let mut action = NavAction::None;
        while self.now_ms < end {
            self.now_ms += 10;
            let a = self.tick();
            if a != NavAction::None {
                action = a;
            }
        }
        action
    }

    fn press(&mut self, id: ButtonId, press: Press) -> NavAction {
        let hold = match press {
            Press::Short => 100,
            Press::Long => 1000,
            Press::VeryLong => 4000,
        };
        self.buttons.down[id as usize] = true;
        let _ = self.run_for(hold);
        self.buttons.down[id as usize] = false;
        // Long enough for a render pass with the new screen.
        self.run_for(150)
    }

    /// Raw ADC count that produces the given probe-side voltage
    /// through the 2:1 divider.
    fn raw_for_volts(volts: f32) -> u16 {
        (volts / 2.0 / 3.3 * 4095.0) as u16
    }
}

#[test]
fn boots_to_home_screen() {
    let mut dev = Device::boot();
    let _ = dev.run_for(200);
    assert_eq!(dev.ctx.screen, Screen::Home);
    assert!(dev.display.lines[0].starts_with("HydroNode"));
}

#[test]
fn menu_navigation_round_trip() {
    let mut dev = Device::boot();
    let _ = dev.press(ButtonId::Mode, Press::Short);
    assert_eq!(dev.ctx.screen, Screen::Menu { cursor: 0 });
    assert_eq!(dev.display.lines[0], "Menu");

    let _ = dev.press(ButtonId::Enter, Press::Short);
    assert_eq!(dev.ctx.screen, Screen::Menu { cursor: 1 });

    let _ = dev.press(ButtonId::Mode, Press::Short);
    assert_eq!(dev.ctx.screen, Screen::Home);
}

#[test]
fn ec_wizard_end_to_end_changes_the_reading() {
    let mut dev = Device::boot();

    // Uncalibrated: the fallback gain applies.
    dev.source.ec_raw = Device::raw_for_volts(1.0);
    let _ = dev.run_for(300);
    assert!((dev.ctx.readings.ec.value - 10_000.0).abs() < 200.0);

    // Menu -> Calibration -> EC wizard.
    let _ = dev.press(ButtonId::Mode, Press::Short);
    let _ = dev.press(ButtonId::Enter, Press::Short);
    let _ = dev.press(ButtonId::Enter, Press::Long);
    assert_eq!(dev.ctx.screen, Screen::CalMenu { cursor: 0 });
    let _ = dev.press(ButtonId::Enter, Press::Long);
    assert!(matches!(dev.ctx.screen, Screen::CalEc { .. }));

    // Capture point A in the low solution.
    dev.source.ec_raw = Device::raw_for_volts(0.10);
    let _ = dev.run_for(300);
    let _ = dev.press(ButtonId::Enter, Press::Long); // to capture screen
    let _ = dev.press(ButtonId::Enter, Press::Long); // capture A

    // Capture point B in the high solution.
    dev.source.ec_raw = Device::raw_for_volts(1.90);
    let _ = dev.run_for(300);
    let _ = dev.press(ButtonId::Enter, Press::Long);
    let _ = dev.press(ButtonId::Enter, Press::Long); // capture B
    let _ = dev.press(ButtonId::Enter, Press::Long); // commit fit

    assert_eq!(dev.ctx.screen, Screen::Menu { cursor: 1 });
    assert!(dev.ctx.ec_cal.valid);

    // The reading in the low solution now reports near its reference.
    dev.source.ec_raw = Device::raw_for_volts(0.10);
    let _ = dev.run_for(300);
    assert!((dev.ctx.readings.ec.value - 1413.0).abs() < 150.0);

    // And the record survives a reboot.
    let reloaded = cal::load_ec(&mut dev.store);
    assert!(reloaded.valid);
    assert!((reloaded.slope - dev.ctx.ec_cal.slope).abs() < 1e-3);
}

#[test]
fn abandoned_wizard_keeps_partial_points_but_no_fit() {
    let mut dev = Device::boot();
    let _ = dev.press(ButtonId::Mode, Press::Short);
    let _ = dev.press(ButtonId::Enter, Press::Short);
    let _ = dev.press(ButtonId::Enter, Press::Long);
    let _ = dev.press(ButtonId::Enter, Press::Long); // EC wizard

    dev.source.ec_raw = Device::raw_for_volts(0.10);
    let _ = dev.run_for(300);
    let _ = dev.press(ButtonId::Enter, Press::Long);
    let _ = dev.press(ButtonId::Enter, Press::Long); // capture A only

    let _ = dev.press(ButtonId::Mode, Press::Short); // abandon

    let record = cal::load_ec(&mut dev.store);
    assert!(record.a.captured);
    assert!(!record.b.captured);
    assert!(!record.valid);
}

#[test]
fn level_wizard_with_custom_unit() {
    let mut dev = Device::boot();
    let _ = dev.press(ButtonId::Mode, Press::Short);
    let _ = dev.press(ButtonId::Enter, Press::Short);
    let _ = dev.press(ButtonId::Enter, Press::Long); // CalMenu
    let _ = dev.press(ButtonId::Enter, Press::Short); // cursor -> Level wizard
    let _ = dev.press(ButtonId::Enter, Press::Long);
    assert_eq!(dev.ctx.screen, Screen::LevelUnit);

    let _ = dev.press(ButtonId::Up, Press::Short); // Percent -> Custom
    let _ = dev.press(ButtonId::Enter, Press::Long); // into the wizard

    dev.source.level_raw = Device::raw_for_volts(0.40);
    let _ = dev.run_for(300);
    let _ = dev.press(ButtonId::Enter, Press::Long);
    let _ = dev.press(ButtonId::Enter, Press::Long); // capture empty

    dev.source.level_raw = Device::raw_for_volts(2.40);
    let _ = dev.run_for(300);
    let _ = dev.press(ButtonId::Enter, Press::Long);
    let _ = dev.press(ButtonId::Enter, Press::Long); // capture full
    let _ = dev.press(ButtonId::Enter, Press::Long); // commit

    assert!(dev.ctx.level_cal.valid);

    // Halfway between the captured voltages reads ~50 %.
    dev.source.level_raw = Device::raw_for_volts(1.40);
    let _ = dev.run_for(300);
    assert!((dev.ctx.readings.level_percent - 50.0).abs() < 3.0);
}

#[test]
fn factory_reset_wipes_credentials_and_requests_restart() {
    let mut dev = Device::boot();
    dev.store.open(NS_WIFI).unwrap();
    dev.store.put_str("ssid", "greenhouse").unwrap();

    let action = dev.press(ButtonId::Mode, Press::VeryLong);
    assert_eq!(action, NavAction::FactoryReset);

    dev.store.open(NS_WIFI).unwrap();
    assert_eq!(dev.store.get_str("ssid", "").as_str(), "");
}

#[test]
fn temperature_appears_on_home_once_plausible() {
    let mut dev = Device::boot();
    let _ = dev.run_for(300);
    assert!(dev.display.lines[1].contains("T:--.-C"));

    dev.source.temp = Some(22.5);
    let _ = dev.run_for(300);
    assert!(dev.display.lines[1].contains("T:22.5C"));

    // A bus error sentinel is ignored, the display keeps the last value.
    dev.source.temp = Some(-127.0);
    let _ = dev.run_for(300);
    assert!(dev.display.lines[1].contains("T:22.5C"));
}
