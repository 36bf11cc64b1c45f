//! Network maintenance and MQTT publishing.
//!
//! The transport (WiFi driver, MQTT client) lives behind the
//! [`NetworkLink`] trait so the policy here - reconnect rate
//! limiting, publish cadence, payload layout - runs identically on
//! host and target. The task is strictly best-effort: any network
//! failure is recorded and the loop moves on.

use core::fmt::Write;

use heapless::String;

use crate::config::{
    FW_VERSION, MQTT_DEFAULT_BASE_TOPIC, MQTT_DEFAULT_PUB_PERIOD_MS, MQTT_RETRY_INTERVAL_MS,
    NS_MQTT,
};
use crate::context::DeviceContext;
use crate::error::{Error, Result};
use crate::store::KvStore;

/// WiFi operating mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiMode {
    #[default]
    Off,
    /// Provisioning access point.
    Ap,
    /// Station, joined to the configured network.
    Sta,
}

impl WifiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WifiMode::Off => "OFF",
            WifiMode::Ap => "AP",
            WifiMode::Sta => "STA",
        }
    }
}

/// Snapshot of the WiFi link, refreshed each network tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WifiStatus {
    pub mode: WifiMode,
    pub connected: bool,
    pub ssid: String<32>,
    pub ip: String<16>,
}

/// MQTT settings, persisted in their own namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String<64>,
    pub port: u16,
    pub user: String<32>,
    pub pass: String<32>,
    pub base_topic: String<32>,
    pub retain: bool,
    pub pub_period_ms: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        let mut base_topic = String::new();
        let _ = base_topic.push_str(MQTT_DEFAULT_BASE_TOPIC);
        Self {
            enabled: false,
            host: String::new(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            base_topic,
            retain: true,
            pub_period_ms: MQTT_DEFAULT_PUB_PERIOD_MS,
        }
    }
}

impl MqttConfig {
    /// Enabled and pointed at a broker.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.host.is_empty()
    }
}

/// Load MQTT settings, falling back to defaults when unset.
pub fn load_mqtt_config<S: KvStore>(store: &mut S) -> MqttConfig {
    let mut cfg = MqttConfig::default();

    if store.open(NS_MQTT).is_err() {
        log::warn!("mqtt namespace unavailable, using defaults");
        return cfg;
    }

    cfg.enabled = store.get_bool("en", false);
    cfg.port = store.get_u16("port", 1883);
    cfg.retain = store.get_bool("ret", true);
    cfg.pub_period_ms = store.get_u16("per", MQTT_DEFAULT_PUB_PERIOD_MS);

    let host = store.get_str("host", "");
    let _ = cfg.host.push_str(host.as_str());
    let user = store.get_str("user", "");
    let _ = cfg.user.push_str(user.as_str());
    let pass = store.get_str("pass", "");
    let _ = cfg.pass.push_str(pass.as_str());
    let topic = store.get_str("topic", MQTT_DEFAULT_BASE_TOPIC);
    cfg.base_topic.clear();
    let _ = cfg.base_topic.push_str(topic.as_str());

    cfg
}

/// Persist MQTT settings.
pub fn save_mqtt_config<S: KvStore>(store: &mut S, cfg: &MqttConfig) -> Result<()> {
    store.open(NS_MQTT)?;
    store.put_bool("en", cfg.enabled)?;
    store.put_str("host", cfg.host.as_str())?;
    store.put_u16("port", cfg.port)?;
    store.put_str("user", cfg.user.as_str())?;
    store.put_str("pass", cfg.pass.as_str())?;
    store.put_str("topic", cfg.base_topic.as_str())?;
    store.put_bool("ret", cfg.retain)?;
    store.put_u16("per", cfg.pub_period_ms)?;
    store.commit()
}

/// Runtime MQTT state, owned by the control loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MqttStatus {
    pub connected: bool,
    pub last_attempt_ms: Option<u64>,
    pub last_publish_ms: Option<u64>,
    pub err: Option<Error>,
}

/// Transport supplied by the target environment.
pub trait NetworkLink {
    /// Current WiFi link state.
    fn wifi_status(&mut self) -> WifiStatus;

    fn mqtt_is_connected(&mut self) -> bool;

    /// Attempt a broker (re)connect. Must not block the loop for
    /// longer than a connect timeout.
    fn mqtt_connect(&mut self, cfg: &MqttConfig) -> Result<()>;

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<()>;
}

fn topic_for(base: &str, suffix: &str) -> String<64> {
    let mut t: String<64> = String::new();
    let _ = t.push_str(base);
    let _ = t.push_str(suffix);
    t
}

/// Status document published under `<base>/status`.
///
/// Written by hand; the heap-free serializers available to this
/// target cannot emit JSON, and the document is small and fixed.
fn status_payload(ctx: &DeviceContext) -> String<256> {
    let mut out: String<256> = String::new();
    let r = &ctx.readings;

    let _ = write!(
        out,
        "{{\"fw\":\"{}\",\"ip\":\"{}\",\"wifi_mode\":\"{}\",\"mqtt\":{},",
        FW_VERSION,
        ctx.wifi.ip.as_str(),
        ctx.wifi.mode.as_str(),
        ctx.mqtt.connected,
    );
    let _ = write!(
        out,
        "\"ec_us\":{:.1},\"ec_v\":{:.3},\"level_value\":{:.1},\"level_percent\":{:.1},\"level_v\":{:.3},",
        r.ec.value, r.ec.voltage, r.level.value, r.level_percent, r.level.voltage,
    );
    match r.temp_c {
        Some(t) => {
            let _ = write!(out, "\"temp_c\":{:.1}}}", t);
        }
        None => {
            let _ = out.push_str("\"temp_c\":null}");
        }
    }
    out
}

/// Network task: refresh WiFi state, keep the broker session alive
/// and publish on the configured cadence.
#[derive(Debug, Default)]
pub struct NetTask;

impl NetTask {
    pub fn service<L: NetworkLink>(&mut self, now_ms: u64, ctx: &mut DeviceContext, link: &mut L) {
        ctx.wifi = link.wifi_status();

        // MQTT only runs on a joined station link.
        if ctx.wifi.mode != WifiMode::Sta || !ctx.wifi.connected {
            ctx.mqtt.connected = false;
            return;
        }

        if !ctx.mqtt_cfg.is_configured() {
            ctx.mqtt.connected = false;
            return;
        }

        ctx.mqtt.connected = link.mqtt_is_connected();
        if !ctx.mqtt.connected {
            let due = match ctx.mqtt.last_attempt_ms {
                None => true,
                Some(t) => now_ms.saturating_sub(t) >= MQTT_RETRY_INTERVAL_MS,
            };
            if !due {
                return;
            }
            ctx.mqtt.last_attempt_ms = Some(now_ms);
            match link.mqtt_connect(&ctx.mqtt_cfg) {
                Ok(()) => {
                    ctx.mqtt.connected = true;
                    ctx.mqtt.err = None;
                    log::info!("mqtt connected to {}", ctx.mqtt_cfg.host.as_str());
                }
                Err(e) => {
                    ctx.mqtt.err = Some(e);
                    log::warn!("mqtt connect failed: {:?}", e);
                    return;
                }
            }
        }

        let due = match ctx.mqtt.last_publish_ms {
            None => true,
            Some(t) => now_ms.saturating_sub(t) >= u64::from(ctx.mqtt_cfg.pub_period_ms),
        };
        if !due {
            return;
        }
        ctx.mqtt.last_publish_ms = Some(now_ms);

        self.publish_all(ctx, link);
    }

    fn publish_all<L: NetworkLink>(&mut self, ctx: &mut DeviceContext, link: &mut L) {
        let base = ctx.mqtt_cfg.base_topic.clone();
        let retain = ctx.mqtt_cfg.retain;
        let r = ctx.readings;

        let status = status_payload(ctx);
        let mut result = link.publish(topic_for(base.as_str(), "/status").as_str(), &status, retain);

        let mut scalar: String<16> = String::new();
        let _ = write!(scalar, "{:.1}", r.ec.value);
        result = result.and(link.publish(topic_for(base.as_str(), "/ec").as_str(), &scalar, retain));

        scalar.clear();
        let _ = write!(scalar, "{:.1}", r.level_percent);
        result = result.and(link.publish(
            topic_for(base.as_str(), "/level/percent").as_str(),
            &scalar,
            retain,
        ));

        scalar.clear();
        let _ = write!(scalar, "{:.1}", r.level.value);
        result = result.and(link.publish(
            topic_for(base.as_str(), "/level/value").as_str(),
            &scalar,
            retain,
        ));

        if let Some(t) = r.temp_c {
            scalar.clear();
            let _ = write!(scalar, "{:.1}", t);
            result = result.and(link.publish(
                topic_for(base.as_str(), "/temp_c").as_str(),
                &scalar,
                retain,
            ));
        }

        if let Err(e) = result {
            ctx.mqtt.err = Some(e);
            ctx.mqtt.connected = false;
            log::warn!("mqtt publish failed: {:?}", e);
        }
    }
}
