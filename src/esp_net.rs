//! ESP-IDF WiFi and MQTT transport.
//!
//! Brings the WiFi link up at boot (station if credentials exist,
//! provisioning AP otherwise) and implements [`NetworkLink`] over
//! the blocking WiFi driver and the MQTT client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration, QoS};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
    EspWifi,
};

use hydronode::config::{WIFI_SETUP_AP_SSID, WIFI_STA_BOOT_TIMEOUT_MS};
use hydronode::error::Error;
use hydronode::net::{MqttConfig, NetworkLink, WifiMode, WifiStatus};

pub struct EspNet<'d> {
    wifi: BlockingWifi<EspWifi<'d>>,
    mode: WifiMode,
    ssid: heapless::String<32>,
    mqtt: Option<EspMqttClient<'static>>,
    mqtt_up: Arc<AtomicBool>,
}

impl<'d> EspNet<'d> {
    /// Bring the link up: join the stored network, or fall back to
    /// the setup AP when there are no credentials or the join times
    /// out.
    pub fn start(
        mut wifi: BlockingWifi<EspWifi<'d>>,
        ssid: &str,
        pass: &str,
    ) -> anyhow::Result<Self> {
        let mut mode = WifiMode::Ap;
        let mut active_ssid: heapless::String<32> = heapless::String::new();

        if !ssid.is_empty() {
            let sta = Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().unwrap_or_default(),
                password: pass.try_into().unwrap_or_default(),
                auth_method: if pass.is_empty() {
                    AuthMethod::None
                } else {
                    AuthMethod::WPA2Personal
                },
                ..Default::default()
            });
            wifi.set_configuration(&sta).context("sta configuration")?;
            wifi.start().context("wifi start")?;

            log::info!(
                "joining '{}' ({} ms window)",
                ssid,
                WIFI_STA_BOOT_TIMEOUT_MS
            );
            match wifi.connect().and_then(|_| wifi.wait_netif_up()) {
                Ok(()) => {
                    mode = WifiMode::Sta;
                    let _ = active_ssid.push_str(ssid);
                }
                Err(e) => {
                    log::warn!("station join failed ({}), starting setup AP", e);
                    let _ = wifi.stop();
                }
            }
        }

        if mode != WifiMode::Sta {
            let ap = Configuration::AccessPoint(AccessPointConfiguration {
                ssid: WIFI_SETUP_AP_SSID.try_into().unwrap_or_default(),
                auth_method: AuthMethod::None,
                ..Default::default()
            });
            wifi.set_configuration(&ap).context("ap configuration")?;
            wifi.start().context("ap start")?;
            let _ = active_ssid.push_str(WIFI_SETUP_AP_SSID);
        }

        Ok(Self {
            wifi,
            mode,
            ssid: active_ssid,
            mqtt: None,
            mqtt_up: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl NetworkLink for EspNet<'_> {
    fn wifi_status(&mut self) -> WifiStatus {
        let mut status = WifiStatus::default();
        status.mode = self.mode;
        status.ssid = self.ssid.clone();

        match self.mode {
            WifiMode::Sta => {
                status.connected = self.wifi.is_connected().unwrap_or(false);
                if let Ok(info) = self.wifi.wifi().sta_netif().get_ip_info() {
                    let mut ip = heapless::String::new();
                    let _ = core::fmt::Write::write_fmt(&mut ip, format_args!("{}", info.ip));
                    status.ip = ip;
                }
            }
            WifiMode::Ap => {
                status.connected = true;
                let _ = status.ip.push_str("192.168.4.1");
            }
            WifiMode::Off => {}
        }
        status
    }

    fn mqtt_is_connected(&mut self) -> bool {
        self.mqtt.is_some() && self.mqtt_up.load(Ordering::Relaxed)
    }

    fn mqtt_connect(&mut self, cfg: &MqttConfig) -> hydronode::Result<()> {
        let url = format!("mqtt://{}:{}", cfg.host.as_str(), cfg.port);
        let conf = MqttClientConfiguration {
            username: (!cfg.user.is_empty()).then(|| cfg.user.as_str()),
            password: (!cfg.pass.is_empty()).then(|| cfg.pass.as_str()),
            ..Default::default()
        };

        let up = Arc::clone(&self.mqtt_up);
        up.store(false, Ordering::Relaxed);
        let client = EspMqttClient::new_cb(&url, &conf, move |event| {
            use esp_idf_svc::mqtt::client::EventPayload;
            match event.payload() {
                EventPayload::Connected(_) => up.store(true, Ordering::Relaxed),
                EventPayload::Disconnected => up.store(false, Ordering::Relaxed),
                EventPayload::Error(e) => log::warn!("mqtt event error: {:?}", e),
                _ => {}
            }
        })
        .map_err(|e| {
            log::warn!("mqtt client create failed: {}", e);
            Error::Mqtt
        })?;

        self.mqtt = Some(client);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> hydronode::Result<()> {
        let client = self.mqtt.as_mut().ok_or(Error::Mqtt)?;
        client
            .enqueue(topic, QoS::AtMostOnce, retain, payload.as_bytes())
            .map(|_| ())
            .map_err(|e| {
                log::warn!("mqtt enqueue failed: {}", e);
                Error::Mqtt
            })
    }
}
