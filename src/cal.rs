//! Calibration engine: two-point linear fits for the EC and level
//! channels, with quality tracking and persisted records.
//!
//! A channel converts probe voltage to an engineering value with
//! `value = slope * volts + offset`. The fit is derived from two
//! captured points; if the points sit closer together than the
//! channel epsilon the fit is degenerate and the previous slope and
//! offset are kept, so a partially-recalibrated channel keeps using
//! its last good fit.
//!
//! Records persist the raw points (plus level unit settings), never
//! the derived fit - the fit is recomputed at boot.

use crate::config::{
    CAL_RECORD_VERSION, EC_DEFAULT_REF_A, EC_DEFAULT_REF_B, EC_EPSILON_VOLTS,
    EC_FALLBACK_US_PER_VOLT, LEVEL_CUSTOM_MAX_DEFAULT, LEVEL_CUSTOM_MAX_FLOOR,
    LEVEL_EPSILON_VOLTS, NS_EC_CAL, NS_LEVEL_CAL,
};
use crate::error::Result;
use crate::store::KvStore;

/// Confidence in the active fit, derived from the voltage separation
/// of the two calibration points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalQuality {
    /// No complete fit has been attempted.
    None,
    /// Both points captured but too close together; fit rejected.
    Weak,
    /// Fit accepted.
    Ok,
}

impl CalQuality {
    pub fn as_u8(self) -> u8 {
        match self {
            CalQuality::None => 0,
            CalQuality::Weak => 1,
            CalQuality::Ok => 2,
        }
    }
}

/// Display/derivation unit for the level channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LevelUnit {
    Percent,
    Custom,
}

impl LevelUnit {
    pub fn as_u8(self) -> u8 {
        match self {
            LevelUnit::Percent => 0,
            LevelUnit::Custom => 1,
        }
    }

    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LevelUnit::Custom,
            _ => LevelUnit::Percent,
        }
    }
}

/// One calibration point: a reference value and the probe voltage
/// captured while the probe sat in that reference.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalPoint {
    pub reference: f32,
    pub voltage: f32,
    pub captured: bool,
}

impl CalPoint {
    const fn new(reference: f32) -> Self {
        Self {
            reference,
            voltage: 0.0,
            captured: false,
        }
    }
}

/// Which EC point a capture targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EcSlot {
    A,
    B,
}

/// Which level point a capture targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelSlot {
    Empty,
    Full,
}

/// EC channel calibration. `us = slope * volts + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EcCal {
    pub a: CalPoint,
    pub b: CalPoint,
    pub slope: f32,
    pub offset: f32,
    pub valid: bool,
    pub quality: CalQuality,
}

impl Default for EcCal {
    fn default() -> Self {
        Self {
            a: CalPoint::new(EC_DEFAULT_REF_A),
            b: CalPoint::new(EC_DEFAULT_REF_B),
            slope: 1.0,
            offset: 0.0,
            valid: false,
            quality: CalQuality::None,
        }
    }
}

impl EcCal {
    /// Recompute the fit from the captured points.
    ///
    /// Prior slope/offset survive every failure path, so conversion
    /// falls back to the last good fit (or the uncalibrated fallback
    /// if there never was one).
    pub fn compute_fit(&mut self) {
        self.valid = false;
        self.quality = CalQuality::None;

        if !self.a.captured || !self.b.captured {
            return;
        }

        let dv = self.b.voltage - self.a.voltage;
        if libm::fabsf(dv) < EC_EPSILON_VOLTS {
            self.quality = CalQuality::Weak;
            return;
        }

        self.slope = (self.b.reference - self.a.reference) / dv;
        self.offset = self.a.reference - self.slope * self.a.voltage;
        self.valid = true;
        self.quality = CalQuality::Ok;
    }

    /// Convert probe voltage to conductivity (µS/cm).
    ///
    /// Without a valid fit a fixed gain keeps the reading at a
    /// plausible magnitude instead of failing outright.
    pub fn us_from_voltage(&self, volts: f32) -> f32 {
        if self.valid {
            self.slope * volts + self.offset
        } else {
            volts * EC_FALLBACK_US_PER_VOLT
        }
    }
}

/// Level channel calibration. `value = slope * volts + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelCal {
    pub empty: CalPoint,
    pub full: CalPoint,
    pub slope: f32,
    pub offset: f32,
    pub valid: bool,
    pub quality: CalQuality,
    pub unit: LevelUnit,
    pub custom_max: f32,
}

impl Default for LevelCal {
    fn default() -> Self {
        Self {
            empty: CalPoint::new(0.0),
            full: CalPoint::new(LEVEL_CUSTOM_MAX_DEFAULT),
            slope: 0.0,
            offset: 0.0,
            valid: false,
            quality: CalQuality::None,
            unit: LevelUnit::Percent,
            custom_max: LEVEL_CUSTOM_MAX_DEFAULT,
        }
    }
}

impl LevelCal {
    /// Recompute the fit from the captured points. Same failure
    /// discipline as [`EcCal::compute_fit`].
    pub fn compute_fit(&mut self) {
        self.valid = false;
        self.quality = CalQuality::None;

        if !self.empty.captured || !self.full.captured {
            return;
        }

        let dv = self.full.voltage - self.empty.voltage;
        if libm::fabsf(dv) < LEVEL_EPSILON_VOLTS {
            self.quality = CalQuality::Weak;
            return;
        }

        self.slope = (self.full.reference - self.empty.reference) / dv;
        self.offset = self.empty.reference - self.slope * self.empty.voltage;
        self.valid = true;
        self.quality = CalQuality::Ok;
    }

    /// Convert probe voltage to a level value. Uncalibrated units
    /// report the raw voltage unchanged.
    pub fn value_from_voltage(&self, volts: f32) -> f32 {
        if self.valid {
            self.slope * volts + self.offset
        } else {
            volts
        }
    }

    /// Clamp a raw derived value into the unit's range.
    pub fn clamp_value(&self, raw: f32) -> f32 {
        let max = match self.unit {
            LevelUnit::Percent => 100.0,
            LevelUnit::Custom => self.custom_max,
        };
        raw.clamp(0.0, max)
    }

    /// Derive the percentage from an already-clamped value.
    pub fn percent_from_value(&self, value: f32) -> f32 {
        let percent = match self.unit {
            LevelUnit::Percent => value,
            LevelUnit::Custom => {
                // custom_max is floored at 1.0 everywhere it is set;
                // guard anyway so a corrupt record cannot divide by zero.
                if self.custom_max <= 0.0001 {
                    0.0
                } else {
                    value / self.custom_max * 100.0
                }
            }
        };
        percent.clamp(0.0, 100.0)
    }

    /// Set the custom maximum, enforcing the hard floor.
    pub fn set_custom_max(&mut self, value: f32) {
        self.custom_max = if value < LEVEL_CUSTOM_MAX_FLOOR {
            LEVEL_CUSTOM_MAX_FLOOR
        } else {
            value
        };
    }
}

/// Store an EC point and persist the channel record immediately.
pub fn capture_ec_point<S: KvStore>(
    cal: &mut EcCal,
    slot: EcSlot,
    reference: f32,
    voltage: f32,
    store: &mut S,
) -> Result<()> {
    let point = match slot {
        EcSlot::A => &mut cal.a,
        EcSlot::B => &mut cal.b,
    };
    point.reference = reference;
    point.voltage = voltage;
    point.captured = true;
    save_ec(store, cal)
}

/// Store a level point and persist the channel record immediately.
pub fn capture_level_point<S: KvStore>(
    cal: &mut LevelCal,
    slot: LevelSlot,
    reference: f32,
    voltage: f32,
    store: &mut S,
) -> Result<()> {
    let point = match slot {
        LevelSlot::Empty => &mut cal.empty,
        LevelSlot::Full => &mut cal.full,
    };
    point.reference = reference;
    point.voltage = voltage;
    point.captured = true;
    save_level(store, cal)
}

/// Load the EC record, falling back to defaults on a missing or
/// stale record, and recompute the fit.
pub fn load_ec<S: KvStore>(store: &mut S) -> EcCal {
    let mut cal = EcCal::default();

    if store.open(NS_EC_CAL).is_err() {
        log::warn!("ec calibration namespace unavailable, using defaults");
        return cal;
    }

    let ver = store.get_u8("ver", 0);
    if ver != CAL_RECORD_VERSION {
        if ver != 0 {
            log::warn!("stale ec calibration record (ver {}), using defaults", ver);
        }
        return cal;
    }

    cal.a.reference = store.get_f32("A_ec", EC_DEFAULT_REF_A);
    cal.a.voltage = store.get_f32("A_v", 0.0);
    cal.a.captured = store.get_bool("A_set", false);

    cal.b.reference = store.get_f32("B_ec", EC_DEFAULT_REF_B);
    cal.b.voltage = store.get_f32("B_v", 0.0);
    cal.b.captured = store.get_bool("B_set", false);

    cal.compute_fit();
    cal
}

/// Persist the EC record (points only; the fit is derived state).
pub fn save_ec<S: KvStore>(store: &mut S, cal: &EcCal) -> Result<()> {
    store.open(NS_EC_CAL)?;
    store.put_u8("ver", CAL_RECORD_VERSION)?;

    store.put_f32("A_ec", cal.a.reference)?;
    store.put_f32("A_v", cal.a.voltage)?;
    store.put_bool("A_set", cal.a.captured)?;

    store.put_f32("B_ec", cal.b.reference)?;
    store.put_f32("B_v", cal.b.voltage)?;
    store.put_bool("B_set", cal.b.captured)?;

    store.commit()
}

/// Load the level record, falling back to defaults on a missing or
/// stale record, and recompute the fit.
pub fn load_level<S: KvStore>(store: &mut S) -> LevelCal {
    let mut cal = LevelCal::default();

    if store.open(NS_LEVEL_CAL).is_err() {
        log::warn!("level calibration namespace unavailable, using defaults");
        return cal;
    }

    let ver = store.get_u8("ver", 0);
    if ver != CAL_RECORD_VERSION {
        if ver != 0 {
            log::warn!(
                "stale level calibration record (ver {}), using defaults",
                ver
            );
        }
        return cal;
    }

    cal.empty.reference = store.get_f32("E_lvl", 0.0);
    cal.empty.voltage = store.get_f32("E_v", 0.0);
    cal.empty.captured = store.get_bool("E_set", false);

    cal.full.reference = store.get_f32("F_lvl", LEVEL_CUSTOM_MAX_DEFAULT);
    cal.full.voltage = store.get_f32("F_v", 0.0);
    cal.full.captured = store.get_bool("F_set", false);

    cal.unit = LevelUnit::from_u8(store.get_u8("unit", 0));
    cal.set_custom_max(store.get_f32("cmax", LEVEL_CUSTOM_MAX_DEFAULT));

    cal.compute_fit();
    cal
}

/// Persist the level record.
pub fn save_level<S: KvStore>(store: &mut S, cal: &LevelCal) -> Result<()> {
    store.open(NS_LEVEL_CAL)?;
    store.put_u8("ver", CAL_RECORD_VERSION)?;

    store.put_f32("E_lvl", cal.empty.reference)?;
    store.put_f32("E_v", cal.empty.voltage)?;
    store.put_bool("E_set", cal.empty.captured)?;

    store.put_f32("F_lvl", cal.full.reference)?;
    store.put_f32("F_v", cal.full.voltage)?;
    store.put_bool("F_set", cal.full.captured)?;

    store.put_u8("unit", cal.unit.as_u8())?;
    store.put_f32("cmax", cal.custom_max)?;

    store.commit()
}
