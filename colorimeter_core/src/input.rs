//! Debounced translation of the raw button bitmask into mode-scoped
//! actions.
//!
//! Simultaneous presses are representable in the bitmask but at most one
//! action is processed per tick, chosen by a fixed priority order. A press
//! inside the debounce window drops the whole bitmask for the tick; there
//! is no merging or queued replay.

use std::time::{Duration, Instant};

use colorimeter_traits::Buttons;

use crate::controller::Mode;

/// One causal user action, already scoped to the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Capture a new blank reference (Measure, non-raw display).
    Blank,
    /// Menu button: opens the menu from Measure, leaves it from Menu.
    MenuButton,
    /// Advance the gain cycle (Measure, raw display only).
    CycleGain,
    Up,
    Down,
    Select,
    /// Any non-menu press while showing a message.
    Acknowledge,
}

/// Timestamp gate ensuring two accepted events are never closer than the
/// debounce interval.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Accept the held bitmask, or drop it entirely when it is empty or
    /// falls inside the debounce window.
    pub fn accept(&mut self, held: Buttons, now: Instant) -> Option<Buttons> {
        if held.is_empty() {
            return None;
        }
        if let Some(last) = self.last_accepted
            && now.saturating_duration_since(last) < self.window
        {
            return None;
        }
        self.last_accepted = Some(now);
        Some(held)
    }
}

/// Map an accepted bitmask to at most one action for the current mode.
///
/// `raw_display` scopes the Measure bindings: blank is disabled and gain
/// enabled only while raw sensor counts are shown.
pub fn decode(mode: Mode, raw_display: bool, held: Buttons) -> Option<Action> {
    match mode {
        Mode::Measure => {
            if !raw_display && held.contains(Buttons::BLANK) {
                Some(Action::Blank)
            } else if held.contains(Buttons::MENU) {
                Some(Action::MenuButton)
            } else if raw_display && held.contains(Buttons::GAIN) {
                Some(Action::CycleGain)
            } else {
                // The integration-time button is reserved; it currently
                // does nothing, matching the device.
                None
            }
        }
        Mode::Menu => {
            if held.contains(Buttons::MENU) {
                Some(Action::MenuButton)
            } else if held.contains(Buttons::UP) {
                Some(Action::Up)
            } else if held.contains(Buttons::DOWN) {
                Some(Action::Down)
            } else if held.contains(Buttons::RIGHT) {
                Some(Action::Select)
            } else {
                None
            }
        }
        Mode::Message => {
            if held.contains(Buttons::MENU) {
                Some(Action::MenuButton)
            } else {
                Some(Action::Acknowledge)
            }
        }
        // No input leaves Abort.
        Mode::Abort => None,
    }
}
