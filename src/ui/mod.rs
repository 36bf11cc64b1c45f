//! User interface subsystem - 20x4 character LCD + three physical
//! buttons.
//!
//! Raw pin levels are classified into press-duration events
//! ([`buttons`]), the navigator consumes those events as a state
//! machine over the menu and wizard screens ([`navigator`]), and the
//! render pass formats the current screen onto the display
//! ([`render`]).

pub mod buttons;
pub mod navigator;
pub mod render;

/// Physical buttons (active-low, to GND with pull-up).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonId {
    /// Home/Menu toggle, backlight, factory reset.
    Mode,
    /// Selection backward / wizard value increment.
    Up,
    /// Selection forward / value decrement; long press commits.
    Enter,
}

impl ButtonId {
    /// All buttons, in the order the scheduler polls them.
    pub const ALL: [ButtonId; 3] = [ButtonId::Mode, ButtonId::Up, ButtonId::Enter];
}

/// Press-duration classes, produced once per release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Press {
    /// 60 ms to 700 ms.
    Short,
    /// 700 ms to 3.5 s.
    Long,
    /// 3.5 s and beyond.
    VeryLong,
}

/// Render sink supplied by the target environment. Implementations
/// truncate or pad each line to the physical width.
pub trait DisplayLines {
    fn set_line(&mut self, row: u8, text: &str);
    fn set_backlight(&mut self, on: bool);
}
