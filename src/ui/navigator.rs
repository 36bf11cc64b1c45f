//! Screen state machine: menus, calibration wizards and the global
//! Mode-button actions.
//!
//! Each wizard screen carries its own scratch values inside the
//! [`Screen`] variant, so abandoning a wizard (Mode press) discards
//! uncommitted edits for free. Committed state - captured points,
//! fits, unit settings - lives in the calibration engine and is
//! persisted at each capture, never on navigation.

use crate::cal::{self, EcSlot, LevelSlot, LevelUnit};
use crate::config::NS_WIFI;
use crate::context::DeviceContext;
use crate::store::KvStore;
use crate::ui::{ButtonId, Press};

/// Entry counts for the cursor-driven menus.
const MENU_ENTRIES: u8 = 3;
const CAL_MENU_ENTRIES: u8 = 3;

/// EC wizard reference edit increments (µS/cm).
const EC_STEP_A: f32 = 10.0;
const EC_STEP_B: f32 = 100.0;

/// Level wizard reference edit increment (level units).
const LEVEL_STEP: f32 = 1.0;

/// EC wizard progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EcStep {
    /// Edit the low reference value.
    SetA,
    /// Probe in the low reference; commit captures.
    CaptureA,
    SetB,
    CaptureB,
    /// Both points captured; commit computes and saves the fit.
    Done,
}

/// Level wizard progression (the unit step is its own screen).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LevelStep {
    EmptySet,
    EmptyCapture,
    FullSet,
    FullCapture,
    Done,
}

/// The active screen, including any wizard scratch state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    Home,
    Menu { cursor: u8 },
    Setup,
    CalMenu { cursor: u8 },
    CalEc { step: EcStep, ref_a: f32, ref_b: f32 },
    CalLevel { step: LevelStep, empty: f32, full: f32 },
    LevelUnit,
    Info,
}

/// Side effects the loop must carry out after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum NavAction {
    None,
    /// Provisioning wiped; the device must restart.
    FactoryReset,
}

fn dec_floor(value: f32, step: f32) -> f32 {
    let next = value - step;
    if next < 0.0 {
        0.0
    } else {
        next
    }
}

fn cursor_back(cursor: u8, entries: u8) -> u8 {
    (cursor + entries - 1) % entries
}

fn cursor_forward(cursor: u8, entries: u8) -> u8 {
    (cursor + 1) % entries
}

/// Seed value for the full-point scratch, per unit.
fn full_scratch_seed(ctx: &DeviceContext) -> f32 {
    match ctx.level_cal.unit {
        LevelUnit::Percent => 100.0,
        LevelUnit::Custom => ctx.level_cal.custom_max,
    }
}

/// Wipe stored WiFi credentials. Best effort; the restart happens
/// regardless so a half-wiped record cannot strand the device.
fn wipe_provisioning<S: KvStore>(store: &mut S) {
    let wiped = store
        .open(NS_WIFI)
        .and_then(|_| store.clear())
        .and_then(|_| store.commit());
    if let Err(e) = wiped {
        log::warn!("provisioning wipe failed: {:?}", e);
    } else {
        log::info!("provisioning wiped, restarting");
    }
}

/// Apply one classified button event to the device state.
pub fn handle_event<S: KvStore>(
    ctx: &mut DeviceContext,
    store: &mut S,
    button: ButtonId,
    press: Press,
) -> NavAction {
    // Mode actions are global and win over any screen, including a
    // wizard in progress.
    if button == ButtonId::Mode {
        match press {
            Press::VeryLong => {
                wipe_provisioning(store);
                return NavAction::FactoryReset;
            }
            Press::Long => {
                ctx.backlight = !ctx.backlight;
                return NavAction::None;
            }
            Press::Short => {
                ctx.screen = match ctx.screen {
                    Screen::Home => Screen::Menu { cursor: 0 },
                    Screen::Menu { .. } => Screen::Home,
                    _ => Screen::Menu { cursor: 0 },
                };
                return NavAction::None;
            }
        }
    }

    let screen = ctx.screen;
    ctx.screen = match screen {
        Screen::Home => match button {
            // Any Enter press wakes into the menu.
            ButtonId::Enter => Screen::Menu { cursor: 0 },
            _ => screen,
        },

        Screen::Menu { cursor } => match (button, press) {
            (ButtonId::Up, Press::Short) => Screen::Menu {
                cursor: cursor_back(cursor, MENU_ENTRIES),
            },
            (ButtonId::Enter, Press::Short) => Screen::Menu {
                cursor: cursor_forward(cursor, MENU_ENTRIES),
            },
            (ButtonId::Enter, Press::Long) => match cursor {
                0 => Screen::Setup,
                1 => Screen::CalMenu { cursor: 0 },
                _ => Screen::Info,
            },
            _ => screen,
        },

        Screen::Setup => match button {
            ButtonId::Enter => Screen::Menu { cursor: 0 },
            _ => screen,
        },

        Screen::Info => match button {
            ButtonId::Enter => Screen::Menu { cursor: 2 },
            _ => screen,
        },

        Screen::CalMenu { cursor } => match (button, press) {
            (ButtonId::Up, Press::Short) => Screen::CalMenu {
                cursor: cursor_back(cursor, CAL_MENU_ENTRIES),
            },
            (ButtonId::Enter, Press::Short) => Screen::CalMenu {
                cursor: cursor_forward(cursor, CAL_MENU_ENTRIES),
            },
            (ButtonId::Enter, Press::Long) => match cursor {
                0 => Screen::CalEc {
                    step: EcStep::SetA,
                    ref_a: ctx.ec_cal.a.reference,
                    ref_b: ctx.ec_cal.b.reference,
                },
                1 => Screen::LevelUnit,
                _ => Screen::Menu { cursor: 1 },
            },
            _ => screen,
        },

        Screen::CalEc { step, ref_a, ref_b } => {
            handle_ec_wizard(ctx, store, button, press, step, ref_a, ref_b)
        }

        Screen::LevelUnit => match (button, press) {
            (ButtonId::Up, Press::Short) => {
                ctx.level_cal.unit = match ctx.level_cal.unit {
                    LevelUnit::Percent => LevelUnit::Custom,
                    LevelUnit::Custom => LevelUnit::Percent,
                };
                screen
            }
            (ButtonId::Enter, Press::Short) => {
                match ctx.level_cal.unit {
                    LevelUnit::Percent => ctx.level_cal.unit = LevelUnit::Custom,
                    LevelUnit::Custom => {
                        let max = ctx.level_cal.custom_max - 1.0;
                        ctx.level_cal.set_custom_max(max);
                    }
                }
                screen
            }
            (ButtonId::Enter, Press::Long) => {
                if let Err(e) = cal::save_level(store, &ctx.level_cal) {
                    log::warn!("level settings save failed: {:?}", e);
                }
                Screen::CalLevel {
                    step: LevelStep::EmptySet,
                    empty: 0.0,
                    full: full_scratch_seed(ctx),
                }
            }
            _ => screen,
        },

        Screen::CalLevel { step, empty, full } => {
            handle_level_wizard(ctx, store, button, press, step, empty, full)
        }
    };

    NavAction::None
}

fn handle_ec_wizard<S: KvStore>(
    ctx: &mut DeviceContext,
    store: &mut S,
    button: ButtonId,
    press: Press,
    step: EcStep,
    mut ref_a: f32,
    mut ref_b: f32,
) -> Screen {
    match (button, press) {
        (ButtonId::Up, Press::Short) => match step {
            EcStep::SetA => ref_a += EC_STEP_A,
            EcStep::SetB => ref_b += EC_STEP_B,
            _ => {}
        },
        (ButtonId::Enter, Press::Short) => match step {
            EcStep::SetA => ref_a = dec_floor(ref_a, EC_STEP_A),
            EcStep::SetB => ref_b = dec_floor(ref_b, EC_STEP_B),
            _ => {}
        },
        (ButtonId::Enter, Press::Long) => {
            let next = match step {
                EcStep::SetA => EcStep::CaptureA,
                EcStep::CaptureA => {
                    let v = ctx.readings.ec.voltage;
                    if let Err(e) =
                        cal::capture_ec_point(&mut ctx.ec_cal, EcSlot::A, ref_a, v, store)
                    {
                        log::warn!("ec point A save failed: {:?}", e);
                    }
                    EcStep::SetB
                }
                EcStep::SetB => EcStep::CaptureB,
                EcStep::CaptureB => {
                    let v = ctx.readings.ec.voltage;
                    if let Err(e) =
                        cal::capture_ec_point(&mut ctx.ec_cal, EcSlot::B, ref_b, v, store)
                    {
                        log::warn!("ec point B save failed: {:?}", e);
                    }
                    EcStep::Done
                }
                EcStep::Done => {
                    ctx.ec_cal.compute_fit();
                    if let Err(e) = cal::save_ec(store, &ctx.ec_cal) {
                        log::warn!("ec calibration save failed: {:?}", e);
                    }
                    return Screen::Menu { cursor: 1 };
                }
            };
            return Screen::CalEc {
                step: next,
                ref_a,
                ref_b,
            };
        }
        _ => {}
    }
    Screen::CalEc { step, ref_a, ref_b }
}

fn handle_level_wizard<S: KvStore>(
    ctx: &mut DeviceContext,
    store: &mut S,
    button: ButtonId,
    press: Press,
    step: LevelStep,
    mut empty: f32,
    mut full: f32,
) -> Screen {
    match (button, press) {
        (ButtonId::Up, Press::Short) => match step {
            LevelStep::EmptySet => empty += LEVEL_STEP,
            LevelStep::FullSet => full += LEVEL_STEP,
            _ => {}
        },
        (ButtonId::Enter, Press::Short) => match step {
            LevelStep::EmptySet => empty = dec_floor(empty, LEVEL_STEP),
            LevelStep::FullSet => full = dec_floor(full, LEVEL_STEP),
            _ => {}
        },
        (ButtonId::Enter, Press::Long) => {
            let next = match step {
                LevelStep::EmptySet => LevelStep::EmptyCapture,
                LevelStep::EmptyCapture => {
                    let v = ctx.readings.level.voltage;
                    if let Err(e) = cal::capture_level_point(
                        &mut ctx.level_cal,
                        LevelSlot::Empty,
                        empty,
                        v,
                        store,
                    ) {
                        log::warn!("level empty point save failed: {:?}", e);
                    }
                    LevelStep::FullSet
                }
                LevelStep::FullSet => LevelStep::FullCapture,
                LevelStep::FullCapture => {
                    let v = ctx.readings.level.voltage;
                    if let Err(e) = cal::capture_level_point(
                        &mut ctx.level_cal,
                        LevelSlot::Full,
                        full,
                        v,
                        store,
                    ) {
                        log::warn!("level full point save failed: {:?}", e);
                    }
                    LevelStep::Done
                }
                LevelStep::Done => {
                    if ctx.level_cal.unit == LevelUnit::Custom {
                        ctx.level_cal.set_custom_max(full);
                    }
                    ctx.level_cal.compute_fit();
                    if let Err(e) = cal::save_level(store, &ctx.level_cal) {
                        log::warn!("level calibration save failed: {:?}", e);
                    }
                    return Screen::Menu { cursor: 1 };
                }
            };
            return Screen::CalLevel {
                step: next,
                empty,
                full,
            };
        }
        _ => {}
    }
    Screen::CalLevel { step, empty, full }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cal::CalQuality;
    use crate::config::EC_DEFAULT_REF_A;
    use crate::store::MemStore;

    fn boot() -> (DeviceContext, MemStore) {
        let mut store = MemStore::new();
        let ctx = DeviceContext::boot(&mut store);
        (ctx, store)
    }

    fn press(
        ctx: &mut DeviceContext,
        store: &mut MemStore,
        button: ButtonId,
        press: Press,
    ) -> NavAction {
        handle_event(ctx, store, button, press)
    }

    #[test]
    fn mode_short_toggles_home_and_menu() {
        let (mut ctx, mut store) = boot();
        let _ = press(&mut ctx, &mut store, ButtonId::Mode, Press::Short);
        assert_eq!(ctx.screen, Screen::Menu { cursor: 0 });
        let _ = press(&mut ctx, &mut store, ButtonId::Mode, Press::Short);
        assert_eq!(ctx.screen, Screen::Home);
    }

    #[test]
    fn mode_short_escapes_a_wizard() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::CalEc {
            step: EcStep::SetB,
            ref_a: 1413.0,
            ref_b: 27_600.0,
        };
        let _ = press(&mut ctx, &mut store, ButtonId::Mode, Press::Short);
        assert_eq!(ctx.screen, Screen::Menu { cursor: 0 });
    }

    #[test]
    fn mode_long_toggles_backlight_without_leaving_screen() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::Info;
        assert!(ctx.backlight);
        let _ = press(&mut ctx, &mut store, ButtonId::Mode, Press::Long);
        assert!(!ctx.backlight);
        assert_eq!(ctx.screen, Screen::Info);
        let _ = press(&mut ctx, &mut store, ButtonId::Mode, Press::Long);
        assert!(ctx.backlight);
    }

    #[test]
    fn enter_from_home_opens_menu() {
        let (mut ctx, mut store) = boot();
        assert_eq!(
            press(&mut ctx, &mut store, ButtonId::Enter, Press::Long),
            NavAction::None
        );
        assert_eq!(ctx.screen, Screen::Menu { cursor: 0 });
    }

    #[test]
    fn menu_cursor_wraps_both_directions() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::Menu { cursor: 0 };

        let _ = press(&mut ctx, &mut store, ButtonId::Up, Press::Short);
        assert_eq!(ctx.screen, Screen::Menu { cursor: 2 });

        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Short);
        assert_eq!(ctx.screen, Screen::Menu { cursor: 0 });
    }

    #[test]
    fn menu_entries_open_their_screens() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::Menu { cursor: 0 };
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);
        assert_eq!(ctx.screen, Screen::Setup);

        ctx.screen = Screen::Menu { cursor: 1 };
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);
        assert_eq!(ctx.screen, Screen::CalMenu { cursor: 0 });

        ctx.screen = Screen::Menu { cursor: 2 };
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);
        assert_eq!(ctx.screen, Screen::Info);
    }

    #[test]
    fn ec_wizard_edits_references_with_floor() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::CalEc {
            step: EcStep::SetA,
            ref_a: 10.0,
            ref_b: 27_600.0,
        };

        let _ = press(&mut ctx, &mut store, ButtonId::Up, Press::Short);
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Short);
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Short);
        // 10 + 10 - 10 - 10 = 0, floored there
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Short);
        assert_eq!(
            ctx.screen,
            Screen::CalEc {
                step: EcStep::SetA,
                ref_a: 0.0,
                ref_b: 27_600.0,
            }
        );
    }

    #[test]
    fn ec_wizard_full_run_produces_valid_persisted_fit() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::CalMenu { cursor: 0 };
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);

        // Point A in the low reference.
        ctx.readings.ec.voltage = 0.10;
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // SetA -> CaptureA
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // capture A

        // Point B in the high reference.
        ctx.readings.ec.voltage = 1.90;
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // SetB -> CaptureB
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // capture B
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // Done -> commit

        assert_eq!(ctx.screen, Screen::Menu { cursor: 1 });
        assert!(ctx.ec_cal.valid);
        assert_eq!(ctx.ec_cal.quality, CalQuality::Ok);

        let reloaded = cal::load_ec(&mut store);
        assert!(reloaded.valid);
        assert!((reloaded.slope - ctx.ec_cal.slope).abs() < 1e-3);
    }

    #[test]
    fn ec_wizard_partial_run_persists_only_point_a() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::CalEc {
            step: EcStep::SetA,
            ref_a: EC_DEFAULT_REF_A,
            ref_b: 27_600.0,
        };
        ctx.readings.ec.voltage = 0.10;
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);

        // Abandon mid-wizard.
        let _ = press(&mut ctx, &mut store, ButtonId::Mode, Press::Short);

        let reloaded = cal::load_ec(&mut store);
        assert!(reloaded.a.captured);
        assert!(!reloaded.b.captured);
        assert!(!reloaded.valid);
    }

    #[test]
    fn level_unit_screen_edits_and_proceeds() {
        let (mut ctx, mut store) = boot();
        ctx.screen = Screen::CalMenu { cursor: 1 };
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);
        assert_eq!(ctx.screen, Screen::LevelUnit);

        // Percent -> Custom, then trim the maximum down.
        let _ = press(&mut ctx, &mut store, ButtonId::Up, Press::Short);
        assert_eq!(ctx.level_cal.unit, LevelUnit::Custom);
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Short);
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Short);
        assert!((ctx.level_cal.custom_max - 98.0).abs() < 1e-3);

        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long);
        assert_eq!(
            ctx.screen,
            Screen::CalLevel {
                step: LevelStep::EmptySet,
                empty: 0.0,
                full: 98.0,
            }
        );
        // Unit choice was saved before the wizard proper started.
        let reloaded = cal::load_level(&mut store);
        assert_eq!(reloaded.unit, LevelUnit::Custom);
    }

    #[test]
    fn level_wizard_full_run_custom_unit() {
        let (mut ctx, mut store) = boot();
        ctx.level_cal.unit = LevelUnit::Custom;
        ctx.level_cal.set_custom_max(200.0);
        ctx.screen = Screen::CalLevel {
            step: LevelStep::EmptySet,
            empty: 0.0,
            full: 200.0,
        };

        ctx.readings.level.voltage = 0.40;
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // EmptySet -> capture screen
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // capture empty

        ctx.readings.level.voltage = 2.40;
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // FullSet -> capture screen
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // capture full
        let _ = press(&mut ctx, &mut store, ButtonId::Enter, Press::Long); // Done -> commit

        assert_eq!(ctx.screen, Screen::Menu { cursor: 1 });
        assert!(ctx.level_cal.valid);
        assert!((ctx.level_cal.custom_max - 200.0).abs() < 1e-3);

        let reloaded = cal::load_level(&mut store);
        assert!(reloaded.valid);
        assert_eq!(reloaded.unit, LevelUnit::Custom);
        // 1.4 V sits halfway between the captured points.
        assert!((reloaded.value_from_voltage(1.40) - 100.0).abs() < 0.5);
    }

    #[test]
    fn factory_reset_wipes_provisioning_from_any_screen() {
        let (mut ctx, mut store) = boot();
        store.open(NS_WIFI).unwrap();
        store.put_str("ssid", "greenhouse").unwrap();
        store.put_str("pass", "secret").unwrap();

        ctx.screen = Screen::CalEc {
            step: EcStep::CaptureB,
            ref_a: 1413.0,
            ref_b: 27_600.0,
        };
        let action = press(&mut ctx, &mut store, ButtonId::Mode, Press::VeryLong);
        assert_eq!(action, NavAction::FactoryReset);

        store.open(NS_WIFI).unwrap();
        assert_eq!(store.get_str("ssid", "").as_str(), "");
        assert_eq!(store.get_str("pass", "").as_str(), "");
    }

    #[test]
    fn up_does_nothing_on_capture_screens() {
        let (mut ctx, mut store) = boot();
        let screen = Screen::CalEc {
            step: EcStep::CaptureA,
            ref_a: 1413.0,
            ref_b: 27_600.0,
        };
        ctx.screen = screen;
        let _ = press(&mut ctx, &mut store, ButtonId::Up, Press::Short);
        assert_eq!(ctx.screen, screen);
    }
}
