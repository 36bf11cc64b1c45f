//! Cooperative scheduler: one `run_once` call per loop iteration.
//!
//! Tasks run in a fixed order - buttons, sensors, render, network -
//! so input latency never depends on sensor or network work. Each
//! periodic task fires at most once per iteration regardless of how
//! far behind it is; a stalled loop catches up gradually instead of
//! bursting.

use crate::config::{TICK_NET_MS, TICK_RENDER_MS, TICK_SENSOR_MS};
use crate::context::DeviceContext;
use crate::net::{NetTask, NetworkLink};
use crate::sensors::{self, SensorSource};
use crate::store::KvStore;
use crate::ui::buttons::ButtonBank;
use crate::ui::navigator::{self, NavAction};
use crate::ui::{ButtonId, DisplayLines};

/// Raw pin levels, supplied by the target environment.
pub trait ButtonInput {
    /// True while the button is physically held.
    fn is_pressed(&mut self, id: ButtonId) -> bool;
}

/// One fixed-period task slot.
#[derive(Clone, Copy, Debug)]
struct Periodic {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Periodic {
    const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    /// True when the period has elapsed; fires immediately on the
    /// first call and never more than once per invocation.
    fn ready(&mut self, now_ms: u64) -> bool {
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.period_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}

/// Loop driver owning the per-task timing state.
pub struct Scheduler {
    buttons: ButtonBank,
    sensor: Periodic,
    render: Periodic,
    net: Periodic,
    net_task: NetTask,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            buttons: ButtonBank::new(),
            sensor: Periodic::new(TICK_SENSOR_MS),
            render: Periodic::new(TICK_RENDER_MS),
            net: Periodic::new(TICK_NET_MS),
            net_task: NetTask,
        }
    }

    /// Run one scheduler iteration.
    ///
    /// A [`NavAction::FactoryReset`] returns immediately; the caller
    /// restarts the device and nothing else this cycle matters.
    pub fn run_once<BI, SS, D, L, K>(
        &mut self,
        now_ms: u64,
        ctx: &mut DeviceContext,
        input: &mut BI,
        source: &mut SS,
        display: &mut D,
        link: &mut L,
        store: &mut K,
    ) -> NavAction
    where
        BI: ButtonInput,
        SS: SensorSource,
        D: DisplayLines,
        L: NetworkLink,
        K: KvStore,
    {
        for id in ButtonId::ALL {
            let level = input.is_pressed(id);
            if let Some(press) = self.buttons.poll(id, level, now_ms) {
                if navigator::handle_event(ctx, store, id, press) == NavAction::FactoryReset {
                    return NavAction::FactoryReset;
                }
            }
        }

        if self.sensor.ready(now_ms) {
            sensors::sample(source, &ctx.ec_cal, &ctx.level_cal, &mut ctx.readings);
        }

        if self.render.ready(now_ms) {
            crate::ui::render::render(ctx, display);
        }

        if self.net.ready(now_ms) {
            self.net_task.service(now_ms, ctx, link);
        }

        NavAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{MqttConfig, WifiStatus};
    use crate::sensors::Channel;
    use crate::store::MemStore;
    use crate::ui::navigator::Screen;
    use crate::ui::Press;

    #[derive(Default)]
    struct ScriptedInput {
        down: [bool; 3],
    }

    impl ButtonInput for ScriptedInput {
        fn is_pressed(&mut self, id: ButtonId) -> bool {
            self.down[id as usize]
        }
    }

    #[derive(Default)]
    struct CountingSource {
        reads: usize,
    }

    impl SensorSource for CountingSource {
        fn read_raw(&mut self, _channel: Channel) -> u16 {
            self.reads += 1;
            1000
        }

        fn read_temp_c(&mut self) -> Option<f32> {
            None
        }
    }

    #[derive(Default)]
    struct CountingDisplay {
        renders: usize,
    }

    impl DisplayLines for CountingDisplay {
        fn set_line(&mut self, row: u8, _text: &str) {
            if row == 0 {
                self.renders += 1;
            }
        }

        fn set_backlight(&mut self, _on: bool) {}
    }

    #[derive(Default)]
    struct OfflineLink {
        polls: usize,
    }

    impl NetworkLink for OfflineLink {
        fn wifi_status(&mut self) -> WifiStatus {
            self.polls += 1;
            WifiStatus::default()
        }

        fn mqtt_is_connected(&mut self) -> bool {
            false
        }

        fn mqtt_connect(&mut self, _cfg: &MqttConfig) -> crate::error::Result<()> {
            Ok(())
        }

        fn publish(&mut self, _t: &str, _p: &str, _r: bool) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct Rig {
        scheduler: Scheduler,
        ctx: DeviceContext,
        input: ScriptedInput,
        source: CountingSource,
        display: CountingDisplay,
        link: OfflineLink,
        store: MemStore,
    }

    impl Rig {
        fn new() -> Self {
            let mut store = MemStore::new();
            let ctx = DeviceContext::boot(&mut store);
            Self {
                scheduler: Scheduler::new(),
                ctx,
                input: ScriptedInput::default(),
                source: CountingSource::default(),
                display: CountingDisplay::default(),
                link: OfflineLink::default(),
                store,
            }
        }

        fn tick(&mut self, now_ms: u64) -> NavAction {
            self.scheduler.run_once(
                now_ms,
                &mut self.ctx,
                &mut self.input,
                &mut self.source,
                &mut self.display,
                &mut self.link,
                &mut self.store,
            )
        }

        /// Press and release a button so it classifies as `press`.
        fn press(&mut self, id: ButtonId, press: Press, at_ms: u64) -> (NavAction, u64) {
            let hold = match press {
                Press::Short => 100,
                Press::Long => 1000,
                Press::VeryLong => 4000,
            };
            self.input.down[id as usize] = true;
            let _ = self.tick(at_ms);
            self.input.down[id as usize] = false;
            let action = self.tick(at_ms + hold);
            (action, at_ms + hold)
        }
    }

    #[test]
    fn all_tasks_fire_on_first_iteration() {
        let mut rig = Rig::new();
        let _ = rig.tick(0);
        assert!(rig.source.reads > 0);
        assert_eq!(rig.display.renders, 1);
        assert_eq!(rig.link.polls, 1);
    }

    #[test]
    fn tasks_honor_their_periods() {
        let mut rig = Rig::new();
        let _ = rig.tick(0);
        let reads_after_first = rig.source.reads;

        // 10 ms later nothing periodic is due.
        let _ = rig.tick(10);
        assert_eq!(rig.source.reads, reads_after_first);
        assert_eq!(rig.display.renders, 1);
        assert_eq!(rig.link.polls, 1);

        // 100 ms: render only.
        let _ = rig.tick(100);
        assert_eq!(rig.display.renders, 2);
        assert_eq!(rig.source.reads, reads_after_first);

        // 250 ms: sensors and render and net due.
        let _ = rig.tick(250);
        assert!(rig.source.reads > reads_after_first);
        assert_eq!(rig.display.renders, 3);
        assert_eq!(rig.link.polls, 2);
    }

    #[test]
    fn stalled_loop_does_not_burst() {
        let mut rig = Rig::new();
        let _ = rig.tick(0);
        assert_eq!(rig.display.renders, 1);

        // A 5 s stall still yields exactly one render on resume.
        let _ = rig.tick(5_000);
        assert_eq!(rig.display.renders, 2);
    }

    #[test]
    fn button_events_reach_the_navigator() {
        let mut rig = Rig::new();
        let (action, _) = rig.press(ButtonId::Mode, Press::Short, 0);
        assert_eq!(action, NavAction::None);
        assert_eq!(rig.ctx.screen, Screen::Menu { cursor: 0 });
    }

    #[test]
    fn factory_reset_short_circuits_the_cycle() {
        let mut rig = Rig::new();
        let _ = rig.tick(0);
        let polls_before = rig.link.polls;

        rig.input.down[ButtonId::Mode as usize] = true;
        let _ = rig.tick(10_000);
        rig.input.down[ButtonId::Mode as usize] = false;
        let action = rig.tick(14_000);

        assert_eq!(action, NavAction::FactoryReset);
        // Remaining tasks were skipped this cycle.
        assert_eq!(rig.link.polls, polls_before + 1);
    }
}
