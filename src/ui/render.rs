//! Screen renderer for the 20x4 character LCD.
//!
//! Pure formatting: reads the context, writes four lines into the
//! [`DisplayLines`] sink. Lines longer than the panel are truncated
//! by the sink, so formatting here never fails hard; a formatting
//! overflow just yields a clipped line.

use core::fmt::Write;

use heapless::String;

use crate::cal::LevelUnit;
use crate::config::{FW_VERSION, WIFI_SETUP_AP_SSID};
use crate::context::DeviceContext;
use crate::net::WifiMode;
use crate::ui::navigator::{EcStep, LevelStep, Screen};
use crate::ui::DisplayLines;

type Line = String<32>;

fn line(args: core::fmt::Arguments<'_>) -> Line {
    let mut s = Line::new();
    let _ = s.write_fmt(args);
    s
}

fn menu_row(selected: bool, label: &str) -> Line {
    let mut s = Line::new();
    let _ = s.push_str(if selected { "> " } else { "  " });
    let _ = s.push_str(label);
    s
}

/// Render the current screen.
pub fn render<D: DisplayLines>(ctx: &DeviceContext, display: &mut D) {
    display.set_backlight(ctx.backlight);

    let rows: [Line; 4] = match ctx.screen {
        Screen::Home => home_rows(ctx),
        Screen::Menu { cursor } => [
            line(format_args!("Menu")),
            menu_row(cursor == 0, "Setup"),
            menu_row(cursor == 1, "Calibration"),
            menu_row(cursor == 2, "Info"),
        ],
        Screen::Setup => [
            line(format_args!("Setup mode")),
            line(format_args!("AP: {}", WIFI_SETUP_AP_SSID)),
            line(format_args!("http://192.168.4.1")),
            line(format_args!("Enter: back")),
        ],
        Screen::CalMenu { cursor } => [
            line(format_args!("Calibration")),
            menu_row(cursor == 0, "EC wizard"),
            menu_row(cursor == 1, "Level wizard"),
            menu_row(cursor == 2, "Back"),
        ],
        Screen::CalEc { step, ref_a, ref_b } => ec_rows(ctx, step, ref_a, ref_b),
        Screen::LevelUnit => level_unit_rows(ctx),
        Screen::CalLevel { step, empty, full } => level_rows(ctx, step, empty, full),
        Screen::Info => [
            line(format_args!("FW: {}", FW_VERSION)),
            line(format_args!(
                "MQTT: {}",
                if ctx.mqtt.connected {
                    "connected"
                } else if ctx.mqtt_cfg.is_configured() {
                    "offline"
                } else {
                    "disabled"
                }
            )),
            line(format_args!("Topic: {}", ctx.mqtt_cfg.base_topic.as_str())),
            line(format_args!("Enter: back")),
        ],
    };

    for (row, text) in rows.iter().enumerate() {
        display.set_line(row as u8, text.as_str());
    }
}

fn home_rows(ctx: &DeviceContext) -> [Line; 4] {
    let mqtt_mark = if ctx.mqtt.connected { " M" } else { "" };
    let title = line(format_args!(
        "HydroNode {}{}",
        ctx.wifi.mode.as_str(),
        mqtt_mark
    ));

    // EC is shown in mS/cm on the panel; internal unit is uS/cm.
    let ec_line = match ctx.readings.temp_c {
        Some(t) => line(format_args!(
            "EC:{:.2}mS  T:{:.1}C",
            ctx.readings.ec.value / 1000.0,
            t
        )),
        None => line(format_args!(
            "EC:{:.2}mS  T:--.-C",
            ctx.readings.ec.value / 1000.0
        )),
    };

    let water = match ctx.level_cal.unit {
        LevelUnit::Percent => line(format_args!("Water: {:.1} %", ctx.readings.level_percent)),
        LevelUnit::Custom => line(format_args!(
            "Water: {:.1}/{:.0}",
            ctx.readings.level.value, ctx.level_cal.custom_max
        )),
    };

    let net = match ctx.wifi.mode {
        WifiMode::Sta => line(format_args!("IP: {}", ctx.wifi.ip.as_str())),
        WifiMode::Ap => line(format_args!("AP: 192.168.4.1")),
        WifiMode::Off => line(format_args!("WiFi off")),
    };

    [title, ec_line, water, net]
}

fn ec_rows(ctx: &DeviceContext, step: EcStep, ref_a: f32, ref_b: f32) -> [Line; 4] {
    match step {
        EcStep::SetA => [
            line(format_args!("EC cal: point A")),
            line(format_args!("Ref: {:.0} uS", ref_a)),
            line(format_args!("Up:+10  Enter:-10")),
            line(format_args!("Hold Enter: next")),
        ],
        EcStep::CaptureA => [
            line(format_args!("Probe in solution A")),
            line(format_args!("Ref: {:.0} uS", ref_a)),
            line(format_args!("Live: {:.3} V", ctx.readings.ec.voltage)),
            line(format_args!("Hold Enter: capture")),
        ],
        EcStep::SetB => [
            line(format_args!("EC cal: point B")),
            line(format_args!("Ref: {:.0} uS", ref_b)),
            line(format_args!("Up:+100 Enter:-100")),
            line(format_args!("Hold Enter: next")),
        ],
        EcStep::CaptureB => [
            line(format_args!("Probe in solution B")),
            line(format_args!("Ref: {:.0} uS", ref_b)),
            line(format_args!("Live: {:.3} V", ctx.readings.ec.voltage)),
            line(format_args!("Hold Enter: capture")),
        ],
        EcStep::Done => [
            line(format_args!("EC cal complete")),
            line(format_args!(
                "A:{:.3}V B:{:.3}V",
                ctx.ec_cal.a.voltage, ctx.ec_cal.b.voltage
            )),
            line(format_args!(
                "Points {}",
                if (ctx.ec_cal.b.voltage - ctx.ec_cal.a.voltage).is_sign_negative() {
                    "inverted"
                } else {
                    "ok"
                }
            )),
            line(format_args!("Hold Enter: save")),
        ],
    }
}

fn level_unit_rows(ctx: &DeviceContext) -> [Line; 4] {
    let choice = match ctx.level_cal.unit {
        LevelUnit::Percent => line(format_args!("> Percent (0-100)")),
        LevelUnit::Custom => line(format_args!("> Custom max {:.0}", ctx.level_cal.custom_max)),
    };
    [
        line(format_args!("Level unit")),
        choice,
        line(format_args!("Up:toggle Enter:-1")),
        line(format_args!("Hold Enter: next")),
    ]
}

fn level_rows(ctx: &DeviceContext, step: LevelStep, empty: f32, full: f32) -> [Line; 4] {
    match step {
        LevelStep::EmptySet => [
            line(format_args!("Level cal: empty")),
            line(format_args!("Ref: {:.1}", empty)),
            line(format_args!("Up:+1  Enter:-1")),
            line(format_args!("Hold Enter: next")),
        ],
        LevelStep::EmptyCapture => [
            line(format_args!("Tank at empty mark")),
            line(format_args!("Ref: {:.1}", empty)),
            line(format_args!("Live: {:.3} V", ctx.readings.level.voltage)),
            line(format_args!("Hold Enter: capture")),
        ],
        LevelStep::FullSet => [
            line(format_args!("Level cal: full")),
            line(format_args!("Ref: {:.1}", full)),
            line(format_args!("Up:+1  Enter:-1")),
            line(format_args!("Hold Enter: next")),
        ],
        LevelStep::FullCapture => [
            line(format_args!("Tank at full mark")),
            line(format_args!("Ref: {:.1}", full)),
            line(format_args!("Live: {:.3} V", ctx.readings.level.voltage)),
            line(format_args!("Hold Enter: capture")),
        ],
        LevelStep::Done => [
            line(format_args!("Level cal complete")),
            line(format_args!(
                "E:{:.3}V F:{:.3}V",
                ctx.level_cal.empty.voltage, ctx.level_cal.full.voltage
            )),
            line(format_args!("")),
            line(format_args!("Hold Enter: save")),
        ],
    }
}
