//! Screen models at the display boundary.
//!
//! Widget layout and drawing are external collaborators; the controller
//! only pushes state into these traits. Screens are created through a
//! `ScreenFactory` and owned by the controller's `ActiveScreen`, which is
//! replaced wholesale on every mode transition so at most one screen
//! instance is ever alive.

use colorimeter_traits::Gain;

use crate::measurement::MeasurementValues;

/// Display sub-kind for the message screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    About,
    Abort,
}

pub trait MeasureScreen {
    fn set_measurement(
        &mut self,
        name: &str,
        units: Option<&str>,
        values: &MeasurementValues,
        precision: u8,
    );
    /// Replace the value area with an overflow notice for this reading.
    fn set_overflow(&mut self, name: &str);
    /// Show the transient "blanking" status while samples are taken.
    fn set_blanking(&mut self);
    fn set_blanked(&mut self, blanked: bool);
    fn set_battery(&mut self, volts: f32);
    fn set_gain(&mut self, gain: Gain);
    fn show(&mut self);
}

pub trait MenuScreen {
    /// How many rows fit on one page; drives the navigator's viewport.
    fn items_per_page(&self) -> usize;
    fn set_items(&mut self, labels: &[String]);
    fn set_cursor(&mut self, row: usize);
    fn show(&mut self);
}

pub trait MessageScreen {
    fn set_message(&mut self, text: &str, kind: MessageKind);
    fn show(&mut self);
}

/// Creates the mode-appropriate screen on each transition.
pub trait ScreenFactory {
    fn measure_screen(&mut self) -> Box<dyn MeasureScreen>;
    fn menu_screen(&mut self) -> Box<dyn MenuScreen>;
    fn message_screen(&mut self) -> Box<dyn MessageScreen>;
}

/// The single live screen; dropping the previous variant on transition
/// bounds display memory on constrained hardware.
pub enum ActiveScreen {
    Measure(Box<dyn MeasureScreen>),
    Menu(Box<dyn MenuScreen>),
    Message(Box<dyn MessageScreen>),
}

impl ActiveScreen {
    pub fn show(&mut self) {
        match self {
            ActiveScreen::Measure(s) => s.show(),
            ActiveScreen::Menu(s) => s.show(),
            ActiveScreen::Message(s) => s.show(),
        }
    }
}
