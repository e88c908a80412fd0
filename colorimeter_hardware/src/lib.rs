#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Simulated hardware backends for the colorimeter.
//!
//! These stand in for the physical sensor board so the full firmware can
//! run on a desktop: a light sensor with gain-scaled counts and a little
//! read noise, a button pad driven by an injector handle, and a battery
//! monitor that low-pass filters a wobbling cell voltage.

pub mod error;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use colorimeter_traits::{
    BatteryMonitor, ButtonPad, Buttons, Gain, LightSensor, NUM_CHANNELS, RawReading,
};

use crate::error::HwError;

const MAX_COUNT: u16 = u16::MAX;

/// Relative sensitivity of each gain step, normalized below against the
/// power-on default.
fn gain_factor(gain: Gain) -> f64 {
    match gain {
        Gain::X0_5 => 0.5,
        Gain::X1 => 1.0,
        Gain::X2 => 2.0,
        Gain::X4 => 4.0,
        Gain::X8 => 8.0,
        Gain::X16 => 16.0,
        Gain::X32 => 32.0,
        Gain::X64 => 64.0,
        Gain::X128 => 128.0,
        Gain::X256 => 256.0,
        Gain::X512 => 512.0,
    }
}

/// Simulated multi-channel light sensor.
///
/// Counts follow a shared illumination level, scaled by the selected gain
/// relative to the default and saturated at the 16-bit ceiling, with a
/// deterministic xorshift jitter so consecutive reads differ slightly.
pub struct SimulatedLightSensor {
    illumination: Rc<Cell<RawReading>>,
    gain: Gain,
    rng: u32,
    connected: bool,
}

impl SimulatedLightSensor {
    pub fn new(counts: RawReading) -> Self {
        SimulatedLightSensor {
            illumination: Rc::new(Cell::new(counts)),
            gain: Gain::DEFAULT,
            rng: 0x2545_f491,
            connected: true,
        }
    }

    /// Uniform illumination across every channel.
    pub fn uniform(count: u16) -> Self {
        Self::new([count; NUM_CHANNELS])
    }

    /// A sensor that was never found on the bus; every read fails.
    pub fn disconnected() -> Self {
        let mut s = Self::uniform(0);
        s.connected = false;
        s
    }

    /// Shared handle for changing the illumination while the sensor is
    /// owned elsewhere.
    pub fn illumination_handle(&self) -> Rc<Cell<RawReading>> {
        Rc::clone(&self.illumination)
    }

    fn jitter(&mut self) -> u16 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (x & 0x07) as u16
    }
}

impl LightSensor for SimulatedLightSensor {
    fn read_raw(&mut self) -> Result<RawReading, Box<dyn std::error::Error + Send + Sync>> {
        if !self.connected {
            return Err(Box::new(HwError::Disconnected));
        }
        let scale = gain_factor(self.gain) / gain_factor(Gain::DEFAULT);
        let base = self.illumination.get();
        let mut out = [0u16; NUM_CHANNELS];
        for (i, c) in out.iter_mut().enumerate() {
            let scaled = (f64::from(base[i]) * scale).min(f64::from(MAX_COUNT)) as u16;
            *c = scaled.saturating_add(self.jitter()).min(MAX_COUNT);
        }
        tracing::trace!(?out, "simulated sensor read");
        Ok(out)
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.connected {
            return Err(Box::new(HwError::Disconnected));
        }
        tracing::debug!(%gain, "simulated gain set");
        self.gain = gain;
        Ok(())
    }

    fn max_count(&self) -> u16 {
        MAX_COUNT
    }
}

/// Handle for injecting presses into a [`SimulatedButtonPad`].
#[derive(Clone)]
pub struct ButtonInjector(Rc<RefCell<VecDeque<Buttons>>>);

impl ButtonInjector {
    pub fn press(&self, buttons: Buttons) {
        self.0.borrow_mut().push_back(buttons);
    }
}

/// Simulated button pad: replays injected presses, one per poll.
#[derive(Default)]
pub struct SimulatedButtonPad {
    queue: Rc<RefCell<VecDeque<Buttons>>>,
}

impl SimulatedButtonPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn injector(&self) -> ButtonInjector {
        ButtonInjector(Rc::clone(&self.queue))
    }
}

impl ButtonPad for SimulatedButtonPad {
    fn pressed(&mut self) -> Buttons {
        self.queue
            .borrow_mut()
            .pop_front()
            .unwrap_or(Buttons::NONE)
    }
}

/// Simulated battery: a cell voltage with measurement wobble, low-pass
/// filtered the way the device smooths its ADC.
pub struct SimulatedBattery {
    cell_volts: f32,
    filtered: f32,
    alpha: f32,
    rng: u32,
}

impl SimulatedBattery {
    pub fn new(cell_volts: f32) -> Self {
        SimulatedBattery {
            cell_volts,
            filtered: cell_volts,
            alpha: 0.1,
            rng: 0x9e37_79b9,
        }
    }

    fn wobble(&mut self) -> f32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        // +/- 20 mV
        ((x & 0xff) as f32 / 255.0 - 0.5) * 0.04
    }
}

impl Default for SimulatedBattery {
    fn default() -> Self {
        Self::new(3.92)
    }
}

impl BatteryMonitor for SimulatedBattery {
    fn update(&mut self) {
        let sample = self.cell_volts + self.wobble();
        self.filtered = self.alpha * sample + (1.0 - self.alpha) * self.filtered;
    }

    fn voltage_lowpass(&self) -> f32 {
        self.filtered
    }
}
