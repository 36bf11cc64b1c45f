//! Sensor sampler: averages raw ADC readings and applies the
//! calibration engine's conversion functions.

use crate::cal::{EcCal, LevelCal};
use crate::config::{
    ADC_MAX_COUNT, ADC_REF_VOLTS, ADC_SAMPLES_PER_READ, EC_DIVIDER_RATIO, LEVEL_DIVIDER_RATIO,
    TEMP_PLAUSIBLE_MAX_C, TEMP_PLAUSIBLE_MIN_C,
};

/// Analog sensor channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Ec,
    Level,
}

/// Raw ADC and 1-Wire access, supplied by the target environment.
pub trait SensorSource {
    /// One raw ADC sample for the channel (12-bit count).
    fn read_raw(&mut self, channel: Channel) -> u16;

    /// Latest temperature conversion, if one completed.
    fn read_temp_c(&mut self) -> Option<f32>;
}

/// Converted state of one analog channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReading {
    /// Averaged raw ADC count.
    pub adc_raw: u16,
    /// Probe-side voltage (after the external divider).
    pub voltage: f32,
    /// Calibrated value (µS/cm for EC, level units for Level).
    pub value: f32,
}

/// Latest converted readings for every sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReadings {
    pub ec: ChannelReading,
    pub level: ChannelReading,
    /// Level expressed as a percentage of the configured range.
    pub level_percent: f32,
    /// Last plausible temperature, if any reading ever succeeded.
    pub temp_c: Option<f32>,
}

fn average_raw<S: SensorSource>(source: &mut S, channel: Channel) -> u16 {
    let mut acc: u32 = 0;
    for _ in 0..ADC_SAMPLES_PER_READ {
        acc += u32::from(source.read_raw(channel));
    }
    (acc / u32::from(ADC_SAMPLES_PER_READ)) as u16
}

fn pin_voltage(adc_raw: u16) -> f32 {
    f32::from(adc_raw) / ADC_MAX_COUNT * ADC_REF_VOLTS
}

/// Run one sampling pass, updating `readings` in place.
///
/// Temperature readings outside the plausible window are discarded
/// and the last valid value retained.
pub fn sample<S: SensorSource>(
    source: &mut S,
    ec_cal: &EcCal,
    level_cal: &LevelCal,
    readings: &mut SensorReadings,
) {
    let ec_raw = average_raw(source, Channel::Ec);
    let ec_volts = pin_voltage(ec_raw) * EC_DIVIDER_RATIO;
    readings.ec = ChannelReading {
        adc_raw: ec_raw,
        voltage: ec_volts,
        value: ec_cal.us_from_voltage(ec_volts),
    };

    let lvl_raw = average_raw(source, Channel::Level);
    let lvl_volts = pin_voltage(lvl_raw) * LEVEL_DIVIDER_RATIO;
    let lvl_value = level_cal.clamp_value(level_cal.value_from_voltage(lvl_volts));
    readings.level = ChannelReading {
        adc_raw: lvl_raw,
        voltage: lvl_volts,
        value: lvl_value,
    };
    readings.level_percent = level_cal.percent_from_value(lvl_value);

    if let Some(t) = source.read_temp_c() {
        if t > TEMP_PLAUSIBLE_MIN_C && t < TEMP_PLAUSIBLE_MAX_C {
            readings.temp_c = Some(t);
        } else {
            log::debug!("discarding implausible temperature {}", t);
        }
    }
}
