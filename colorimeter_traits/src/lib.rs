//! Hardware-boundary traits and shared device types for the colorimeter.
//!
//! All hardware interactions in `colorimeter_core` go through the traits in
//! this crate: `LightSensor`, `ButtonPad`, `BatteryMonitor`, and
//! `SerialLink`. The simulated backends live in `colorimeter_hardware`.

pub mod channel;
pub mod clock;

pub use channel::{Channel, NUM_CHANNELS, RawReading};
pub use clock::{Clock, MonotonicClock};

use std::error::Error;

/// Discrete sensor gain settings, wavelength-sensor style (0.5x .. 512x).
///
/// The set is fixed and ordered; `next()` cycles through it with wraparound
/// and `from_label()` resolves a persisted label by direct lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    X0_5,
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
    X128,
    X256,
    X512,
}

impl Gain {
    pub const ALL: [Gain; 11] = [
        Gain::X0_5,
        Gain::X1,
        Gain::X2,
        Gain::X4,
        Gain::X8,
        Gain::X16,
        Gain::X32,
        Gain::X64,
        Gain::X128,
        Gain::X256,
        Gain::X512,
    ];

    /// Power-on default.
    pub const DEFAULT: Gain = Gain::X16;

    pub fn label(self) -> &'static str {
        match self {
            Gain::X0_5 => "0.5x",
            Gain::X1 => "1x",
            Gain::X2 => "2x",
            Gain::X4 => "4x",
            Gain::X8 => "8x",
            Gain::X16 => "16x",
            Gain::X32 => "32x",
            Gain::X64 => "64x",
            Gain::X128 => "128x",
            Gain::X256 => "256x",
            Gain::X512 => "512x",
        }
    }

    /// Resolve a persisted gain label; `None` for unknown labels.
    pub fn from_label(label: &str) -> Option<Gain> {
        Gain::ALL.iter().copied().find(|g| g.label() == label)
    }

    /// The next setting in the cycle, wrapping after the last.
    pub fn next(self) -> Gain {
        let idx = Gain::ALL
            .iter()
            .position(|g| *g == self)
            .unwrap_or_default();
        Gain::ALL[(idx + 1) % Gain::ALL.len()]
    }
}

impl std::fmt::Display for Gain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw button state, one bit per key, as latched by the button shifter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons(pub u8);

impl Buttons {
    pub const NONE: Buttons = Buttons(0x00);
    pub const GAIN: Buttons = Buttons(0x01);
    pub const ITIME: Buttons = Buttons(0x02);
    pub const BLANK: Buttons = Buttons(0x04);
    pub const MENU: Buttons = Buttons(0x08);
    pub const RIGHT: Buttons = Buttons(0x10);
    pub const DOWN: Buttons = Buttons(0x20);
    pub const UP: Buttons = Buttons(0x40);
    pub const LEFT: Buttons = Buttons(0x80);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Buttons) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for Buttons {
    type Output = Buttons;
    fn bitor(self, rhs: Buttons) -> Buttons {
        Buttons(self.0 | rhs.0)
    }
}

/// Multi-channel light sensor boundary.
///
/// `read_raw` returns saturated counts as-is; overflow detection against
/// `max_count` happens in the measurement pipeline so that per-reading and
/// fatal error paths stay separate.
pub trait LightSensor {
    fn read_raw(&mut self) -> Result<RawReading, Box<dyn Error + Send + Sync>>;

    fn set_gain(&mut self, gain: Gain) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Saturation ceiling for a single channel count.
    fn max_count(&self) -> u16;
}

/// Physical button matrix; returns the currently held bitmask.
pub trait ButtonPad {
    fn pressed(&mut self) -> Buttons;
}

/// Battery voltage monitor with a low-pass filtered readout.
pub trait BatteryMonitor {
    fn update(&mut self);
    fn voltage_lowpass(&self) -> f32;
}

/// Byte-oriented serial link for the line-delimited command protocol.
///
/// `read_byte` must never block: it returns `None` when no byte is
/// pending. `write_line` appends the newline terminator itself.
pub trait SerialLink {
    fn read_byte(&mut self) -> Option<u8>;
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}
