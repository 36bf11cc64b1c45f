//! ESP32-C3 firmware entry point.
//!
//! Constructs the ESP-IDF peripherals, wires them into the portable
//! controller via the trait seams, and runs the cooperative loop at
//! a 10 ms cadence.

mod esp_net;
mod lcd;
mod nvs_store;
mod onewire_temp;

use std::time::Instant;

use anyhow::Context;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::adc::attenuation::DB_11;
use esp_idf_svc::hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, Gpio0, Gpio1, Input, PinDriver, Pull};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::FromValueType;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use hydronode::config::{LCD_ADDR, NS_WIFI};
use hydronode::sensors::{Channel, SensorSource};
use hydronode::store::KvStore;
use hydronode::ui::ButtonId;
use hydronode::{DeviceContext, NavAction, Scheduler};

use esp_net::EspNet;
use lcd::Lcd;
use nvs_store::NvsStore;
use onewire_temp::TempProbe;

/// ADC channels plus the temperature probe.
struct EspSensors<'d, A> {
    ec: AdcChannelDriver<'d, Gpio0, A>,
    level: AdcChannelDriver<'d, Gpio1, A>,
    probe: Option<TempProbe<'d>>,
}

impl<'d, A: std::borrow::Borrow<AdcDriver<'d, esp_idf_svc::hal::adc::ADC1>>> SensorSource
    for EspSensors<'d, A>
{
    fn read_raw(&mut self, channel: Channel) -> u16 {
        let read = match channel {
            Channel::Ec => self.ec.read_raw(),
            Channel::Level => self.level.read_raw(),
        };
        match read {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("adc read failed: {}", e);
                0
            }
        }
    }

    fn read_temp_c(&mut self) -> Option<f32> {
        self.probe.as_mut()?.poll()
    }
}

/// Active-low buttons on pulled-up inputs.
struct GpioButtons<'d> {
    pins: [PinDriver<'d, AnyIOPin, Input>; 3],
}

impl hydronode::ButtonInput for GpioButtons<'_> {
    fn is_pressed(&mut self, id: ButtonId) -> bool {
        self.pins[id as usize].is_low()
    }
}

fn input_pull_up<'d>(pin: AnyIOPin) -> anyhow::Result<PinDriver<'d, AnyIOPin, Input>> {
    let mut driver = PinDriver::input(pin).context("button pin")?;
    driver.set_pull(Pull::Up).context("button pull-up")?;
    Ok(driver)
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let peripherals = Peripherals::take().context("peripherals")?;
    let sys_loop = EspSystemEventLoop::take().context("event loop")?;
    let partition = EspDefaultNvsPartition::take().context("nvs partition")?;

    let mut store = NvsStore::new(partition.clone());
    let mut ctx = DeviceContext::boot(&mut store);

    // Display first, so boot problems are visible on the panel.
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &I2cConfig::new().baudrate(100u32.kHz().into()),
    )
    .context("i2c")?;
    let mut display = Lcd::new(i2c, LCD_ADDR);

    let adc = AdcDriver::new(peripherals.adc1).context("adc")?;
    let adc_config = AdcChannelConfig {
        attenuation: DB_11,
        ..Default::default()
    };
    let mut sensors = EspSensors {
        ec: AdcChannelDriver::new(&adc, peripherals.pins.gpio0, &adc_config).context("ec adc")?,
        level: AdcChannelDriver::new(&adc, peripherals.pins.gpio1, &adc_config)
            .context("level adc")?,
        probe: PinDriver::input_output_od(AnyIOPin::from(peripherals.pins.gpio5))
            .ok()
            .and_then(TempProbe::new),
    };

    let mut buttons = GpioButtons {
        pins: [
            input_pull_up(AnyIOPin::from(peripherals.pins.gpio2))?,
            input_pull_up(AnyIOPin::from(peripherals.pins.gpio3))?,
            input_pull_up(AnyIOPin::from(peripherals.pins.gpio4))?,
        ],
    };

    let (ssid, pass) = match store.open(NS_WIFI) {
        Ok(()) => (store.get_str("ssid", ""), store.get_str("pass", "")),
        Err(_) => (Default::default(), Default::default()),
    };
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(partition)).context("wifi")?,
        sys_loop,
    )
    .context("blocking wifi")?;
    let mut link = EspNet::start(wifi, ssid.as_str(), pass.as_str())?;

    log::info!("hydronode up, entering control loop");
    let mut scheduler = Scheduler::new();
    let started = Instant::now();

    loop {
        let now_ms = started.elapsed().as_millis() as u64;
        let action = scheduler.run_once(
            now_ms,
            &mut ctx,
            &mut buttons,
            &mut sensors,
            &mut display,
            &mut link,
            &mut store,
        );

        if action == NavAction::FactoryReset {
            log::warn!("factory reset requested, restarting");
            FreeRtos::delay_ms(100);
            unsafe { esp_idf_svc::sys::esp_restart() };
        }

        FreeRtos::delay_ms(10);
    }
}
