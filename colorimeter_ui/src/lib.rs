#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Console frontend: renders the device screens as small text frames.
//!
//! Each screen formats a complete frame; the shared sink only writes a
//! frame when it differs from the previous one, so the ~100 Hz run loop
//! does not flood the terminal. Frames go to stderr, keeping stdout free
//! for the serial command protocol.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::io::Write;
use std::rc::Rc;

use colorimeter_core::{
    MeasureScreen, MeasurementValues, MenuScreen, MessageKind, MessageScreen, ScreenFactory,
};
use colorimeter_traits::{Channel, Gain};

/// Rows available for menu items on the device display.
const MENU_ROWS: usize = 4;

struct FrameSink {
    out: Box<dyn Write>,
    last: Option<String>,
}

impl FrameSink {
    fn present(&mut self, frame: String) {
        if self.last.as_deref() == Some(frame.as_str()) {
            return;
        }
        if write!(self.out, "{frame}").and_then(|()| self.out.flush()).is_err() {
            tracing::debug!("console frame dropped");
        }
        self.last = Some(frame);
    }
}

/// Factory for the console screens. All screens share one sink so frame
/// dedup survives mode transitions.
pub struct ConsoleFrontend {
    sink: Rc<RefCell<FrameSink>>,
}

impl ConsoleFrontend {
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    pub fn with_writer(out: Box<dyn Write>) -> Self {
        ConsoleFrontend {
            sink: Rc::new(RefCell::new(FrameSink { out, last: None })),
        }
    }
}

impl ScreenFactory for ConsoleFrontend {
    fn measure_screen(&mut self) -> Box<dyn MeasureScreen> {
        Box::new(ConsoleMeasure {
            sink: Rc::clone(&self.sink),
            name: String::new(),
            units: None,
            values: None,
            overflow: None,
            blanking: false,
            blanked: false,
            battery: None,
            gain: None,
            precision: 2,
        })
    }

    fn menu_screen(&mut self) -> Box<dyn MenuScreen> {
        Box::new(ConsoleMenu {
            sink: Rc::clone(&self.sink),
            items: Vec::new(),
            cursor: 0,
        })
    }

    fn message_screen(&mut self) -> Box<dyn MessageScreen> {
        Box::new(ConsoleMessage {
            sink: Rc::clone(&self.sink),
            text: String::new(),
            kind: MessageKind::Error,
        })
    }
}

struct ConsoleMeasure {
    sink: Rc<RefCell<FrameSink>>,
    name: String,
    units: Option<String>,
    values: Option<MeasurementValues>,
    overflow: Option<String>,
    blanking: bool,
    blanked: bool,
    battery: Option<f32>,
    gain: Option<Gain>,
    precision: u8,
}

impl ConsoleMeasure {
    fn render(&self) -> String {
        let mut f = String::new();
        let _ = writeln!(f, "== {} ==", self.name);
        if self.blanking {
            let _ = writeln!(f, "  blanking...");
        } else if let Some(name) = &self.overflow {
            let _ = writeln!(f, "  {name}: OVERFLOW");
        } else if let Some(values) = &self.values {
            let prec = usize::from(self.precision);
            match values {
                MeasurementValues::Raw(raw) => {
                    for ch in Channel::ALL {
                        let _ = writeln!(f, "  {:>5}  {}", ch.name(), raw[ch.index()]);
                    }
                }
                MeasurementValues::PerChannel(vals) => {
                    for ch in Channel::ALL {
                        let _ =
                            writeln!(f, "  {:>5}  {:.prec$}", ch.name(), vals[ch.index()]);
                    }
                }
                MeasurementValues::Scalar(v) => {
                    let units = self.units.as_deref().unwrap_or("");
                    let _ = writeln!(f, "  {v:.prec$} {units}");
                }
            }
        }
        let blank = if self.blanked { "blanked" } else { "no blank" };
        let gain = self.gain.map(|g| g.label()).unwrap_or("-");
        match self.battery {
            Some(v) => {
                let _ = writeln!(f, "[{blank} | gain {gain} | batt {v:.2}V]");
            }
            None => {
                let _ = writeln!(f, "[{blank} | gain {gain}]");
            }
        }
        f
    }
}

impl MeasureScreen for ConsoleMeasure {
    fn set_measurement(
        &mut self,
        name: &str,
        units: Option<&str>,
        values: &MeasurementValues,
        precision: u8,
    ) {
        self.name = name.to_string();
        self.units = units.map(str::to_string);
        self.values = Some(values.clone());
        self.precision = precision;
        self.overflow = None;
        self.blanking = false;
    }

    fn set_overflow(&mut self, name: &str) {
        self.name = name.to_string();
        self.overflow = Some(name.to_string());
        self.blanking = false;
    }

    fn set_blanking(&mut self) {
        self.blanking = true;
    }

    fn set_blanked(&mut self, blanked: bool) {
        self.blanked = blanked;
    }

    fn set_battery(&mut self, volts: f32) {
        self.battery = Some(volts);
    }

    fn set_gain(&mut self, gain: Gain) {
        self.gain = Some(gain);
    }

    fn show(&mut self) {
        let frame = self.render();
        self.sink.borrow_mut().present(frame);
    }
}

struct ConsoleMenu {
    sink: Rc<RefCell<FrameSink>>,
    items: Vec<String>,
    cursor: usize,
}

impl MenuScreen for ConsoleMenu {
    fn items_per_page(&self) -> usize {
        MENU_ROWS
    }

    fn set_items(&mut self, labels: &[String]) {
        self.items = labels.to_vec();
    }

    fn set_cursor(&mut self, row: usize) {
        self.cursor = row;
    }

    fn show(&mut self) {
        let mut f = String::from("== menu ==\n");
        for (row, item) in self.items.iter().enumerate() {
            let marker = if row == self.cursor { '>' } else { ' ' };
            let _ = writeln!(f, "{marker} {item}");
        }
        self.sink.borrow_mut().present(f);
    }
}

struct ConsoleMessage {
    sink: Rc<RefCell<FrameSink>>,
    text: String,
    kind: MessageKind,
}

impl MessageScreen for ConsoleMessage {
    fn set_message(&mut self, text: &str, kind: MessageKind) {
        self.text = text.to_string();
        self.kind = kind;
    }

    fn show(&mut self) {
        let heading = match self.kind {
            MessageKind::Error => "error",
            MessageKind::About => "about",
            MessageKind::Abort => "ABORTED",
        };
        let frame = format!("== {heading} ==\n{}\n", self.text);
        self.sink.borrow_mut().present(frame);
    }
}
