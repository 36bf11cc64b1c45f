//! DS18B20 temperature probe on a 1-Wire bus.
//!
//! Conversions are never awaited in-line: a measurement is kicked
//! off on one sensor pass and collected on a later one, keeping the
//! control loop free of the 750 ms conversion wait.

use std::time::Instant;

use ds18b20::{Ds18b20, Resolution};
use esp_idf_svc::hal::delay::Delay;
use esp_idf_svc::hal::gpio::{AnyIOPin, InputOutput, PinDriver};
use one_wire_bus::OneWire;

type Bus<'d> = OneWire<PinDriver<'d, AnyIOPin, InputOutput>>;

pub struct TempProbe<'d> {
    bus: Bus<'d>,
    delay: Delay,
    started_at: Option<Instant>,
}

impl<'d> TempProbe<'d> {
    pub fn new(pin: PinDriver<'d, AnyIOPin, InputOutput>) -> Option<Self> {
        match OneWire::new(pin) {
            Ok(bus) => Some(Self {
                bus,
                delay: Delay::new_default(),
                started_at: None,
            }),
            Err(e) => {
                log::warn!("1-wire bus init failed: {:?}", e);
                None
            }
        }
    }

    fn start_conversion(&mut self) {
        match ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay) {
            Ok(()) => self.started_at = Some(Instant::now()),
            Err(e) => {
                log::debug!("ds18b20 conversion start failed: {:?}", e);
                self.started_at = None;
            }
        }
    }

    fn read_first_device(&mut self) -> Option<f32> {
        let device = self
            .bus
            .devices(false, &mut self.delay)
            .next()?
            .map_err(|e| log::debug!("1-wire search failed: {:?}", e))
            .ok()?;
        let sensor = Ds18b20::new::<()>(device)
            .map_err(|e| log::debug!("not a ds18b20: {:?}", e))
            .ok()?;
        sensor
            .read_data(&mut self.bus, &mut self.delay)
            .map(|data| data.temperature)
            .map_err(|e| log::debug!("ds18b20 read failed: {:?}", e))
            .ok()
    }

    /// Collect a finished conversion if one is due, then start the
    /// next. Returns a fresh reading at most once per conversion.
    pub fn poll(&mut self) -> Option<f32> {
        match self.started_at {
            None => {
                self.start_conversion();
                None
            }
            Some(t0) => {
                if t0.elapsed().as_millis() < u128::from(Resolution::Bits12.max_measurement_time_millis()) {
                    return None;
                }
                let reading = self.read_first_device();
                self.start_conversion();
                reading
            }
        }
    }
}
