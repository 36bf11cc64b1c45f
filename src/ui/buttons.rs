//! Button event classifier.
//!
//! Converts polled pin levels into press-duration events. The
//! classifier is release-triggered: nothing is emitted while a
//! button is held, so a very-long action cannot be previewed before
//! release. That is a documented trade-off, not a defect.
//!
//! Callers must poll every button each scheduler iteration (at most
//! every ~20 ms) for the duration thresholds to resolve correctly.

use crate::config::{PRESS_LONG_MS, PRESS_SHORT_MS, PRESS_VERY_LONG_MS};
use crate::ui::{ButtonId, Press};

/// Per-button edge tracking state.
#[derive(Clone, Copy, Debug, Default)]
struct ButtonState {
    down: bool,
    pressed_at_ms: u64,
}

/// Classifier state for all three buttons.
#[derive(Debug, Default)]
pub struct ButtonBank {
    states: [ButtonState; 3],
}

impl ButtonBank {
    pub const fn new() -> Self {
        Self {
            states: [ButtonState {
                down: false,
                pressed_at_ms: 0,
            }; 3],
        }
    }

    /// Feed one poll of a button's pin level.
    ///
    /// On the falling edge the press start is recorded; on the rising
    /// edge the held duration is classified. Anything shorter than
    /// the short threshold is contact bounce and is suppressed.
    pub fn poll(&mut self, id: ButtonId, is_down: bool, now_ms: u64) -> Option<Press> {
        let state = &mut self.states[id as usize];

        if is_down && !state.down {
            state.down = true;
            state.pressed_at_ms = now_ms;
            return None;
        }

        if !is_down && state.down {
            state.down = false;
            let held = now_ms.saturating_sub(state.pressed_at_ms);
            return classify(held);
        }

        None
    }
}

fn classify(held_ms: u64) -> Option<Press> {
    if held_ms >= PRESS_VERY_LONG_MS {
        Some(Press::VeryLong)
    } else if held_ms >= PRESS_LONG_MS {
        Some(Press::Long)
    } else if held_ms >= PRESS_SHORT_MS {
        Some(Press::Short)
    } else {
        None
    }
}
