//! Test doubles for the hardware boundary: an in-memory serial link, a
//! scripted button pad, a fixed-reading sensor, and a headless screen
//! frontend that records what the controller pushed to it.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use colorimeter_traits::{
    BatteryMonitor, ButtonPad, Buttons, Gain, LightSensor, NUM_CHANNELS, RawReading, SerialLink,
};

use crate::measurement::MeasurementValues;
use crate::screen::{MeasureScreen, MenuScreen, MessageKind, MessageScreen, ScreenFactory};

/// In-memory serial link: bytes fed in are drained by `read_byte`, lines
/// written out are collected for assertions.
#[derive(Debug, Default)]
pub struct MemoryLink {
    incoming: VecDeque<u8>,
    pub sent: Vec<String>,
}

impl MemoryLink {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes);
    }
}

impl SerialLink for MemoryLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.incoming.pop_front()
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.sent.push(line.to_string());
        Ok(())
    }
}

/// Sensor returning a settable reading; records every gain change.
pub struct StaticSensor {
    pub reading: Arc<Mutex<RawReading>>,
    pub max_count: u16,
    pub gains_applied: Vec<Gain>,
}

impl StaticSensor {
    pub fn new(reading: RawReading) -> Self {
        Self {
            reading: Arc::new(Mutex::new(reading)),
            max_count: 65535,
            gains_applied: Vec::new(),
        }
    }

    pub fn uniform(count: u16) -> Self {
        Self::new([count; NUM_CHANNELS])
    }

    /// Shared handle for mutating the reading after the sensor moved into
    /// the controller.
    pub fn handle(&self) -> Arc<Mutex<RawReading>> {
        Arc::clone(&self.reading)
    }
}

impl LightSensor for StaticSensor {
    fn read_raw(&mut self) -> Result<RawReading, Box<dyn Error + Send + Sync>> {
        match self.reading.lock() {
            Ok(r) => Ok(*r),
            Err(_) => Err(Box::new(std::io::Error::other("reading poisoned"))),
        }
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.gains_applied.push(gain);
        Ok(())
    }

    fn max_count(&self) -> u16 {
        self.max_count
    }
}

/// Pad that replays a scripted sequence of bitmasks, then reports nothing
/// held.
#[derive(Debug, Default)]
pub struct ScriptedPad {
    queue: Arc<Mutex<VecDeque<Buttons>>>,
}

impl ScriptedPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Arc<Mutex<VecDeque<Buttons>>> {
        Arc::clone(&self.queue)
    }

    pub fn push(&self, buttons: Buttons) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(buttons);
        }
    }
}

impl ButtonPad for ScriptedPad {
    fn pressed(&mut self) -> Buttons {
        self.queue
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Buttons::NONE)
    }
}

/// Battery monitor with a fixed filtered voltage.
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub f32);

impl BatteryMonitor for FixedBattery {
    fn update(&mut self) {}

    fn voltage_lowpass(&self) -> f32 {
        self.0
    }
}

/// Everything the headless screens have been told, for assertions.
#[derive(Debug, Default, Clone)]
pub struct ScreenState {
    /// Screen kinds created so far, in order ("measure", "menu", "message").
    pub created: Vec<&'static str>,
    pub shows: usize,
    pub measurement_name: Option<String>,
    pub units: Option<String>,
    pub values: Option<MeasurementValues>,
    pub precision: Option<u8>,
    pub overflow: Option<String>,
    pub blanking: bool,
    pub blanked: Option<bool>,
    pub battery_volts: Option<f32>,
    pub gain_label: Option<String>,
    pub menu_labels: Vec<String>,
    pub menu_cursor: Option<usize>,
    pub message: Option<String>,
    pub message_kind: Option<MessageKind>,
}

/// Screen factory whose screens write into a shared `ScreenState`.
#[derive(Debug, Default)]
pub struct HeadlessFrontend {
    state: Arc<Mutex<ScreenState>>,
}

impl HeadlessFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<Mutex<ScreenState>> {
        Arc::clone(&self.state)
    }

    fn record_created(&self, kind: &'static str) {
        if let Ok(mut s) = self.state.lock() {
            s.created.push(kind);
        }
    }
}

impl ScreenFactory for HeadlessFrontend {
    fn measure_screen(&mut self) -> Box<dyn MeasureScreen> {
        self.record_created("measure");
        Box::new(HeadlessMeasure {
            state: Arc::clone(&self.state),
        })
    }

    fn menu_screen(&mut self) -> Box<dyn MenuScreen> {
        self.record_created("menu");
        Box::new(HeadlessMenu {
            state: Arc::clone(&self.state),
            items_per_page: 4,
        })
    }

    fn message_screen(&mut self) -> Box<dyn MessageScreen> {
        self.record_created("message");
        Box::new(HeadlessMessage {
            state: Arc::clone(&self.state),
        })
    }
}

struct HeadlessMeasure {
    state: Arc<Mutex<ScreenState>>,
}

impl MeasureScreen for HeadlessMeasure {
    fn set_measurement(
        &mut self,
        name: &str,
        units: Option<&str>,
        values: &MeasurementValues,
        precision: u8,
    ) {
        if let Ok(mut s) = self.state.lock() {
            s.measurement_name = Some(name.to_string());
            s.units = units.map(str::to_string);
            s.values = Some(values.clone());
            s.precision = Some(precision);
            s.overflow = None;
        }
    }

    fn set_overflow(&mut self, name: &str) {
        if let Ok(mut s) = self.state.lock() {
            s.overflow = Some(name.to_string());
        }
    }

    fn set_blanking(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.blanking = true;
        }
    }

    fn set_blanked(&mut self, blanked: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.blanked = Some(blanked);
        }
    }

    fn set_battery(&mut self, volts: f32) {
        if let Ok(mut s) = self.state.lock() {
            s.battery_volts = Some(volts);
        }
    }

    fn set_gain(&mut self, gain: Gain) {
        if let Ok(mut s) = self.state.lock() {
            s.gain_label = Some(gain.label().to_string());
        }
    }

    fn show(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.shows += 1;
        }
    }
}

struct HeadlessMenu {
    state: Arc<Mutex<ScreenState>>,
    items_per_page: usize,
}

impl MenuScreen for HeadlessMenu {
    fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    fn set_items(&mut self, labels: &[String]) {
        if let Ok(mut s) = self.state.lock() {
            s.menu_labels = labels.to_vec();
        }
    }

    fn set_cursor(&mut self, row: usize) {
        if let Ok(mut s) = self.state.lock() {
            s.menu_cursor = Some(row);
        }
    }

    fn show(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.shows += 1;
        }
    }
}

struct HeadlessMessage {
    state: Arc<Mutex<ScreenState>>,
}

impl MessageScreen for HeadlessMessage {
    fn set_message(&mut self, text: &str, kind: MessageKind) {
        if let Ok(mut s) = self.state.lock() {
            s.message = Some(text.to_string());
            s.message_kind = Some(kind);
        }
    }

    fn show(&mut self) {
        if let Ok(mut s) = self.state.lock() {
            s.shows += 1;
        }
    }
}

/// Sensor whose reads always fail; for exercising the fail-stop path.
pub struct BrokenSensor;

impl LightSensor for BrokenSensor {
    fn read_raw(&mut self) -> Result<RawReading, Box<dyn Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("bus hang")))
    }

    fn set_gain(&mut self, _gain: Gain) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn max_count(&self) -> u16 {
        65535
    }
}
