//! NVS-backed [`KvStore`].
//!
//! One `EspNvs` handle per open namespace, recreated on `open`. f32
//! values are stored as their raw bit pattern in a u32 entry; NVS has
//! no native float type.

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

use hydronode::config::{NS_EC_CAL, NS_LEVEL_CAL, NS_MQTT, NS_WIFI};
use hydronode::error::{Error, Result};
use hydronode::store::{KvStore, ValueString};

/// Keys the application uses per namespace, needed to emulate a
/// namespace-wide clear (the safe NVS binding has no erase-all).
fn namespace_keys(namespace: &str) -> &'static [&'static str] {
    match namespace {
        NS_WIFI => &["ssid", "pass"],
        NS_MQTT => &["en", "host", "port", "user", "pass", "topic", "ret", "per"],
        NS_EC_CAL => &["ver", "A_ec", "A_v", "A_set", "B_ec", "B_v", "B_set"],
        NS_LEVEL_CAL => &[
            "ver", "E_lvl", "E_v", "E_set", "F_lvl", "F_v", "F_set", "unit", "cmax",
        ],
        _ => &[],
    }
}

pub struct NvsStore {
    partition: EspDefaultNvsPartition,
    open: Option<(ValueString, EspNvs<NvsDefault>)>,
}

impl NvsStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self {
            partition,
            open: None,
        }
    }

    fn handle(&mut self) -> Option<&mut EspNvs<NvsDefault>> {
        self.open.as_mut().map(|(_, nvs)| nvs)
    }

    fn get_u32_bits(&mut self, key: &str) -> Option<u32> {
        self.handle()?.get_u32(key).ok().flatten()
    }
}

impl KvStore for NvsStore {
    fn open(&mut self, namespace: &str) -> Result<()> {
        let nvs = EspNvs::new(self.partition.clone(), namespace, true).map_err(|e| {
            log::warn!("nvs open {} failed: {}", namespace, e);
            Error::Storage
        })?;
        let mut name = ValueString::new();
        name.push_str(namespace).map_err(|_| Error::Storage)?;
        self.open = Some((name, nvs));
        Ok(())
    }

    fn get_f32(&mut self, key: &str, default: f32) -> f32 {
        match self.get_u32_bits(key) {
            Some(bits) => f32::from_bits(bits),
            None => default,
        }
    }

    fn get_bool(&mut self, key: &str, default: bool) -> bool {
        match self.handle().and_then(|nvs| nvs.get_u8(key).ok().flatten()) {
            Some(v) => v != 0,
            None => default,
        }
    }

    fn get_u8(&mut self, key: &str, default: u8) -> u8 {
        self.handle()
            .and_then(|nvs| nvs.get_u8(key).ok().flatten())
            .unwrap_or(default)
    }

    fn get_u16(&mut self, key: &str, default: u16) -> u16 {
        self.handle()
            .and_then(|nvs| nvs.get_u16(key).ok().flatten())
            .unwrap_or(default)
    }

    fn get_str(&mut self, key: &str, default: &str) -> ValueString {
        let mut buf = [0u8; 64];
        let read = self
            .handle()
            .and_then(|nvs| nvs.get_str(key, &mut buf).ok().flatten());

        let mut out = ValueString::new();
        let _ = out.push_str(read.unwrap_or(default));
        out
    }

    fn put_f32(&mut self, key: &str, value: f32) -> Result<()> {
        self.handle()
            .ok_or(Error::Storage)?
            .set_u32(key, value.to_bits())
            .map_err(|_| Error::Storage)
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put_u8(key, u8::from(value))
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<()> {
        self.handle()
            .ok_or(Error::Storage)?
            .set_u8(key, value)
            .map_err(|_| Error::Storage)
    }

    fn put_u16(&mut self, key: &str, value: u16) -> Result<()> {
        self.handle()
            .ok_or(Error::Storage)?
            .set_u16(key, value)
            .map_err(|_| Error::Storage)
    }

    fn put_str(&mut self, key: &str, value: &str) -> Result<()> {
        self.handle()
            .ok_or(Error::Storage)?
            .set_str(key, value)
            .map_err(|_| Error::Storage)
    }

    fn clear(&mut self) -> Result<()> {
        let namespace = match &self.open {
            Some((name, _)) => name.clone(),
            None => return Err(Error::Storage),
        };
        let nvs = self.handle().ok_or(Error::Storage)?;
        for key in namespace_keys(namespace.as_str()) {
            // Missing keys are fine; only real failures abort.
            if let Err(e) = nvs.remove(key) {
                log::warn!("nvs remove {}/{} failed: {}", namespace.as_str(), key, e);
                return Err(Error::Storage);
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        // The safe binding commits on every set.
        Ok(())
    }
}
