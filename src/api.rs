//! Serialized views of device state for the configuration surface.
//!
//! These are the stable wire shapes a provisioning client sees; field
//! names are part of the contract and carry the persisted-key casing
//! for the calibration flags.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::cal::{EcCal, LevelCal};
use crate::config::{API_VERSION, FW_VERSION};
use crate::context::DeviceContext;
use crate::net::MqttConfig;

#[derive(Debug, Serialize)]
pub struct WifiDto {
    pub mode: &'static str,
    pub connected: bool,
    pub ip: String<16>,
    pub ssid: String<32>,
}

#[derive(Debug, Serialize)]
pub struct MqttInfoDto {
    pub enabled: bool,
    pub connected: bool,
    pub base_topic: String<32>,
    pub err: Option<&'static str>,
}

/// Top-level device status document.
#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub fw: &'static str,
    pub api: u8,
    pub wifi: WifiDto,
    pub mqtt: MqttInfoDto,
    pub temp_c: Option<f32>,
}

impl StatusDto {
    pub fn from_context(ctx: &DeviceContext) -> Self {
        Self {
            fw: FW_VERSION,
            api: API_VERSION,
            wifi: WifiDto {
                mode: ctx.wifi.mode.as_str(),
                connected: ctx.wifi.connected,
                ip: ctx.wifi.ip.clone(),
                ssid: ctx.wifi.ssid.clone(),
            },
            mqtt: MqttInfoDto {
                enabled: ctx.mqtt_cfg.enabled,
                connected: ctx.mqtt.connected,
                base_topic: ctx.mqtt_cfg.base_topic.clone(),
                err: ctx.mqtt.err.map(crate::Error::as_str),
            },
            temp_c: ctx.readings.temp_c,
        }
    }
}

/// Live EC channel reading.
#[derive(Debug, Serialize)]
pub struct EcDto {
    pub us_cm: f32,
    pub v: f32,
    pub adc_raw: u16,
}

impl EcDto {
    pub fn from_context(ctx: &DeviceContext) -> Self {
        Self {
            us_cm: ctx.readings.ec.value,
            v: ctx.readings.ec.voltage,
            adc_raw: ctx.readings.ec.adc_raw,
        }
    }
}

/// Live level channel reading.
#[derive(Debug, Serialize)]
pub struct LevelDto {
    pub percent: f32,
    pub value: f32,
    pub v: f32,
    pub adc_raw: u16,
    pub unit: u8,
    pub custom_max: f32,
}

impl LevelDto {
    pub fn from_context(ctx: &DeviceContext) -> Self {
        Self {
            percent: ctx.readings.level_percent,
            value: ctx.readings.level.value,
            v: ctx.readings.level.voltage,
            adc_raw: ctx.readings.level.adc_raw,
            unit: ctx.level_cal.unit.as_u8(),
            custom_max: ctx.level_cal.custom_max,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EcCalDto {
    #[serde(rename = "A_set")]
    pub a_set: bool,
    #[serde(rename = "B_set")]
    pub b_set: bool,
    #[serde(rename = "A_ec")]
    pub a_ec: f32,
    #[serde(rename = "B_ec")]
    pub b_ec: f32,
    #[serde(rename = "A_v")]
    pub a_v: f32,
    #[serde(rename = "B_v")]
    pub b_v: f32,
    pub valid: bool,
    pub quality: u8,
}

impl EcCalDto {
    pub fn from_cal(cal: &EcCal) -> Self {
        Self {
            a_set: cal.a.captured,
            b_set: cal.b.captured,
            a_ec: cal.a.reference,
            b_ec: cal.b.reference,
            a_v: cal.a.voltage,
            b_v: cal.b.voltage,
            valid: cal.valid,
            quality: cal.quality.as_u8(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LevelCalDto {
    #[serde(rename = "E_set")]
    pub e_set: bool,
    #[serde(rename = "F_set")]
    pub f_set: bool,
    #[serde(rename = "E_lvl")]
    pub e_lvl: f32,
    #[serde(rename = "F_lvl")]
    pub f_lvl: f32,
    #[serde(rename = "E_v")]
    pub e_v: f32,
    #[serde(rename = "F_v")]
    pub f_v: f32,
    pub valid: bool,
    pub quality: u8,
    pub unit: u8,
    pub custom_max: f32,
}

impl LevelCalDto {
    pub fn from_cal(cal: &LevelCal) -> Self {
        Self {
            e_set: cal.empty.captured,
            f_set: cal.full.captured,
            e_lvl: cal.empty.reference,
            f_lvl: cal.full.reference,
            e_v: cal.empty.voltage,
            f_v: cal.full.voltage,
            valid: cal.valid,
            quality: cal.quality.as_u8(),
            unit: cal.unit.as_u8(),
            custom_max: cal.custom_max,
        }
    }
}

/// Both channels' calibration records.
#[derive(Debug, Serialize)]
pub struct CalDto {
    pub ec: EcCalDto,
    pub level: LevelCalDto,
}

impl CalDto {
    pub fn from_context(ctx: &DeviceContext) -> Self {
        Self {
            ec: EcCalDto::from_cal(&ctx.ec_cal),
            level: LevelCalDto::from_cal(&ctx.level_cal),
        }
    }
}

/// Full MQTT settings view. The password is write-only and never
/// reported back.
#[derive(Debug, Serialize)]
pub struct MqttSettingsDto {
    pub enabled: bool,
    pub host: String<64>,
    pub port: u16,
    pub user: String<32>,
    pub base_topic: String<32>,
    pub retain: bool,
    pub pub_period_ms: u16,
}

impl MqttSettingsDto {
    pub fn from_config(cfg: &MqttConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            host: cfg.host.clone(),
            port: cfg.port,
            user: cfg.user.clone(),
            base_topic: cfg.base_topic.clone(),
            retain: cfg.retain,
            pub_period_ms: cfg.pub_period_ms,
        }
    }
}

/// Partial MQTT settings update; absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct MqttSettingsPatch {
    pub enabled: Option<bool>,
    pub host: Option<String<64>>,
    pub port: Option<u16>,
    pub user: Option<String<32>>,
    pub pass: Option<String<32>>,
    pub base_topic: Option<String<32>>,
    pub retain: Option<bool>,
    pub pub_period_ms: Option<u16>,
}

impl MqttSettingsPatch {
    pub fn apply(&self, cfg: &mut MqttConfig) {
        if let Some(v) = self.enabled {
            cfg.enabled = v;
        }
        if let Some(v) = &self.host {
            cfg.host = v.clone();
        }
        if let Some(v) = self.port {
            cfg.port = v;
        }
        if let Some(v) = &self.user {
            cfg.user = v.clone();
        }
        if let Some(v) = &self.pass {
            cfg.pass = v.clone();
        }
        if let Some(v) = &self.base_topic {
            cfg.base_topic = v.clone();
        }
        if let Some(v) = self.retain {
            cfg.retain = v;
        }
        if let Some(v) = self.pub_period_ms {
            cfg.pub_period_ms = v;
        }
    }
}

/// Credentials submitted through the provisioning form.
#[derive(Debug, Deserialize)]
pub struct WifiCredentialsDto {
    pub ssid: String<32>,
    pub pass: String<64>,
}
