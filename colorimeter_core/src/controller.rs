//! The device controller: mode state machine, run loop, and boot wiring.
//!
//! Construction goes through [`ControllerBuilder`], which accepts the
//! fallible boot results (sensor probe, config load, calibrations load)
//! and elevates their failures into the initial mode: a failed sensor
//! probe lands the device in `Abort`, and any boot-time file error shows
//! a `Message` first. After that, every mode change funnels through
//! [`Controller::enter`], which tears down the previous screen and
//! constructs the next one, so the set of legal transitions is spelled
//! out in one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::eyre;
use tracing::{debug, error, info, warn};

use colorimeter_config::{
    CalibrationSet, CalibrationsError, Config, ConfigError,
};
use colorimeter_traits::{
    BatteryMonitor, ButtonPad, Clock, Gain, LightSensor, MonotonicClock, SerialLink,
};

use crate::command::{self, CommandChannel};
use crate::error::{BuildError, MeasureError, Result, SensorInitError};
use crate::input::{Action, Debounce, decode};
use crate::measurement::{MeasurementName, MeasurementValues};
use crate::menu::{MenuEntry, MenuNavigator};
use crate::pipeline::{self, BlankReference};
use crate::screen::{ActiveScreen, MessageKind, ScreenFactory};
use crate::FIRMWARE_VERSION;

/// The four operating modes. `Abort` is terminal: nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Measure,
    Menu,
    Message,
    Abort,
}

/// A requested transition, carrying everything the target mode needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeRequest {
    Measure,
    Menu,
    Message { text: String, kind: MessageKind },
    Abort { text: String },
}

/// Loop pacing and sampling parameters.
#[derive(Debug, Clone, Copy)]
pub struct ControllerCfg {
    /// Target interval between run-loop ticks.
    pub loop_interval: Duration,
    /// Minimum spacing between two accepted button events.
    pub debounce: Duration,
    /// Raw samples folded into one blank reference.
    pub blank_samples: usize,
    /// Pause between blank samples.
    pub blank_interval: Duration,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            loop_interval: Duration::from_millis(10),
            debounce: Duration::from_millis(600),
            blank_samples: 3,
            blank_interval: Duration::from_millis(10),
        }
    }
}

pub struct ControllerBuilder<S, P, B, F, L> {
    sensor: Option<std::result::Result<S, SensorInitError>>,
    pad: Option<P>,
    battery: Option<B>,
    frontend: Option<F>,
    link: Option<L>,
    config: Option<std::result::Result<Config, ConfigError>>,
    calibrations: Option<std::result::Result<CalibrationSet, CalibrationsError>>,
    clock: Option<Box<dyn Clock>>,
    cfg: ControllerCfg,
}

impl<S, P, B, F, L> Default for ControllerBuilder<S, P, B, F, L> {
    fn default() -> Self {
        Self {
            sensor: None,
            pad: None,
            battery: None,
            frontend: None,
            link: None,
            config: None,
            calibrations: None,
            clock: None,
            cfg: ControllerCfg::default(),
        }
    }
}

impl<S, P, B, F, L> ControllerBuilder<S, P, B, F, L>
where
    S: LightSensor,
    P: ButtonPad,
    B: BatteryMonitor,
    F: ScreenFactory,
    L: SerialLink,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// The sensor probe result. An `Err` is not fatal to construction:
    /// the controller boots into `Abort` and still serves the screen and
    /// serial link.
    pub fn with_sensor(mut self, sensor: std::result::Result<S, SensorInitError>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_pad(mut self, pad: P) -> Self {
        self.pad = Some(pad);
        self
    }

    pub fn with_battery(mut self, battery: B) -> Self {
        self.battery = Some(battery);
        self
    }

    pub fn with_frontend(mut self, frontend: F) -> Self {
        self.frontend = Some(frontend);
        self
    }

    pub fn with_link(mut self, link: L) -> Self {
        self.link = Some(link);
        self
    }

    /// The config load result. An `Err` queues a boot message and falls
    /// back to defaults.
    pub fn with_config(mut self, config: std::result::Result<Config, ConfigError>) -> Self {
        self.config = Some(config);
        self
    }

    /// The calibrations load result. An `Err` queues a boot message and
    /// leaves the menu with only the built-in measurements.
    pub fn with_calibrations(
        mut self,
        calibrations: std::result::Result<CalibrationSet, CalibrationsError>,
    ) -> Self {
        self.calibrations = Some(calibrations);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_cfg(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn build(mut self) -> std::result::Result<Controller<S, P, B, F, L>, BuildError> {
        let sensor_probe = self.sensor.take().ok_or(BuildError::MissingSensor)?;
        let pad = self.pad.take().ok_or(BuildError::MissingPad)?;
        let battery = self.battery.take().ok_or(BuildError::MissingBattery)?;
        let mut frontend = self.frontend.take().ok_or(BuildError::MissingFrontend)?;
        let link = self.link.take().ok_or(BuildError::MissingLink)?;
        let config_result = self.config.take().ok_or(BuildError::MissingConfig)?;
        let calibrations_result =
            self.calibrations.take().ok_or(BuildError::MissingCalibrations)?;
        let clock = self
            .clock
            .take()
            .unwrap_or_else(|| Box::new(MonotonicClock::new()));

        // When several boot-time errors stack up, the most recent one is
        // shown first; the rest sit in the calibration error queue.
        let mut boot_message: Option<(String, MessageKind)> = None;

        let config = match config_result {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "configuration load failed, using defaults");
                boot_message = Some((e.to_string(), MessageKind::Error));
                Config::default()
            }
        };

        let calibrations = match calibrations_result {
            Ok(set) => {
                if set.has_errors() {
                    warn!(
                        skipped = set.error_count(),
                        "calibrations loaded with invalid entries"
                    );
                    boot_message = Some((
                        "errors found in calibrations file".to_string(),
                        MessageKind::Error,
                    ));
                }
                set
            }
            Err(e) => {
                error!(error = %e, "calibrations load failed");
                boot_message = Some((e.to_string(), MessageKind::Error));
                CalibrationSet::default()
            }
        };

        let mut items = vec![
            MenuEntry::Measurement(MeasurementName::Absorbance),
            MenuEntry::Measurement(MeasurementName::Transmittance),
            MenuEntry::Measurement(MeasurementName::RawSensor),
        ];
        items.extend(
            calibrations
                .names()
                .map(|n| MenuEntry::Measurement(MeasurementName::Calibrated(n.to_string()))),
        );
        items.push(MenuEntry::About);

        let measurement = match config.startup.as_deref() {
            None => MeasurementName::Absorbance,
            Some(startup) => {
                let found = items.iter().find_map(|e| match e {
                    MenuEntry::Measurement(m) if m.label() == startup => Some(m.clone()),
                    _ => None,
                });
                match found {
                    Some(m) => m,
                    None => {
                        warn!(startup, "startup measurement not found in menu");
                        boot_message = Some((
                            format!("startup measurement '{startup}' not found"),
                            MessageKind::Error,
                        ));
                        MeasurementName::Absorbance
                    }
                }
            }
        };

        // Unknown labels were already rejected by Config::validate.
        let gain = config.gain_setting().unwrap_or(Gain::DEFAULT);

        // The preliminary blank doubles as the presence probe. It is
        // captured silently: `is_blanked` stays false until the user
        // blanks on purpose.
        let mut abort_text = None;
        let mut blank = BlankReference::neutral();
        let sensor = match sensor_probe {
            Ok(mut sensor) => {
                let probe = sensor.set_gain(gain).and_then(|()| {
                    BlankReference::capture(
                        &mut sensor,
                        clock.as_ref(),
                        self.cfg.blank_samples,
                        self.cfg.blank_interval,
                    )
                });
                match probe {
                    Ok(preliminary) => {
                        blank = preliminary;
                        Some(sensor)
                    }
                    Err(e) => {
                        let init = SensorInitError(e.to_string());
                        error!(error = %init, "sensor probe failed");
                        abort_text = Some(init.to_string());
                        None
                    }
                }
            }
            Err(init) => {
                error!(error = %init, "sensor missing at boot");
                abort_text = Some(init.to_string());
                None
            }
        };

        let precision = config.precision();
        let debounce = Debounce::new(self.cfg.debounce);
        let screen = ActiveScreen::Measure(frontend.measure_screen());

        let mut controller = Controller {
            cfg: self.cfg,
            clock,
            sensor,
            pad,
            battery,
            frontend,
            link,
            commands: CommandChannel::new(),
            debounce,
            calibrations,
            navigator: MenuNavigator::new(items),
            mode: Mode::Measure,
            screen,
            measurement,
            blank,
            is_blanked: false,
            gain,
            precision,
        };

        let request = if let Some(text) = abort_text {
            ModeRequest::Abort { text }
        } else if let Some((text, kind)) = boot_message {
            ModeRequest::Message { text, kind }
        } else {
            ModeRequest::Measure
        };
        controller.enter(request);

        info!(
            measurement = %controller.measurement,
            gain = %controller.gain,
            calibrations = controller.calibrations.len(),
            "controller ready"
        );
        Ok(controller)
    }
}

pub struct Controller<S, P, B, F, L> {
    cfg: ControllerCfg,
    clock: Box<dyn Clock>,
    /// `None` when the boot probe failed; the device sits in `Abort`.
    sensor: Option<S>,
    pad: P,
    battery: B,
    frontend: F,
    link: L,
    commands: CommandChannel,
    debounce: Debounce,
    calibrations: CalibrationSet,
    navigator: MenuNavigator,
    mode: Mode,
    screen: ActiveScreen,
    measurement: MeasurementName,
    blank: BlankReference,
    is_blanked: bool,
    gain: Gain,
    precision: u8,
}

impl<S, P, B, F, L> std::fmt::Debug for Controller<S, P, B, F, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("mode", &self.mode)
            .field("measurement", &self.measurement)
            .finish_non_exhaustive()
    }
}

impl<S, P, B, F, L> Controller<S, P, B, F, L>
where
    S: LightSensor,
    P: ButtonPad,
    B: BatteryMonitor,
    F: ScreenFactory,
    L: SerialLink,
{
    pub fn builder() -> ControllerBuilder<S, P, B, F, L> {
        ControllerBuilder::new()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn measurement(&self) -> &MeasurementName {
        &self.measurement
    }

    pub fn is_blanked(&self) -> bool {
        self.is_blanked
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Malformed serial lines dropped so far.
    pub fn decode_error_count(&self) -> u64 {
        self.commands.decode_errors()
    }

    /// Direct access to the serial link, for scripting traffic in tests
    /// and draining buffers at shutdown.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Run until `stop` is raised or a fatal error surfaces.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::SeqCst) {
            self.tick()?;
            self.clock.sleep(self.cfg.loop_interval);
        }
        info!("controller stopped");
        Ok(())
    }

    /// One iteration of the run loop: serial first, then buttons, then one
    /// refresh of whichever screen is active.
    pub fn tick(&mut self) -> Result<()> {
        self.poll_commands()?;
        self.poll_buttons()?;
        if self.mode == Mode::Measure {
            self.render_measure()?;
        } else {
            self.screen.show();
        }
        Ok(())
    }

    /// The one place modes change. The previous screen is dropped and the
    /// target mode's screen constructed, so at most one screen is ever
    /// alive.
    pub fn enter(&mut self, request: ModeRequest) {
        match request {
            ModeRequest::Measure => {
                self.screen = ActiveScreen::Measure(self.frontend.measure_screen());
                self.mode = Mode::Measure;
            }
            ModeRequest::Menu => {
                let screen = self.frontend.menu_screen();
                self.navigator.reset(screen.items_per_page());
                self.screen = ActiveScreen::Menu(screen);
                self.mode = Mode::Menu;
                self.refresh_menu_screen();
            }
            ModeRequest::Message { text, kind } => {
                let mut screen = self.frontend.message_screen();
                screen.set_message(&text, kind);
                screen.show();
                self.screen = ActiveScreen::Message(screen);
                self.mode = Mode::Message;
            }
            ModeRequest::Abort { text } => {
                let mut screen = self.frontend.message_screen();
                screen.set_message(&text, MessageKind::Abort);
                screen.show();
                self.screen = ActiveScreen::Message(screen);
                self.mode = Mode::Abort;
            }
        }
        debug!(mode = ?self.mode, "mode entered");
    }

    fn poll_commands(&mut self) -> Result<()> {
        let Some(cmd) = self.commands.poll(&mut self.link) else {
            return Ok(());
        };
        let response = match cmd.get("command") {
            None => command::missing_response(),
            Some(value) if value.as_str() == Some("read") => match self.sensor.as_mut() {
                None => command::sensor_unavailable_response(),
                Some(sensor) => {
                    let raw = sensor
                        .read_raw()
                        .map_err(|e| eyre!("sensor read failed: {e}"))?;
                    let blank = self.is_blanked.then_some(&self.blank);
                    command::read_response(&raw, blank)
                }
            },
            Some(value) => command::unknown_response(value),
        };
        self.link.write_line(&response.to_string())?;
        Ok(())
    }

    fn poll_buttons(&mut self) -> Result<()> {
        let held = self.pad.pressed();
        let Some(held) = self.debounce.accept(held, self.clock.now()) else {
            return Ok(());
        };
        let Some(action) = decode(self.mode, self.measurement.is_raw_sensor(), held) else {
            return Ok(());
        };
        debug!(?action, mode = ?self.mode, "button action");
        match action {
            Action::Blank => self.capture_blank()?,
            Action::MenuButton => match self.mode {
                Mode::Measure => self.enter(ModeRequest::Menu),
                Mode::Menu => self.enter(ModeRequest::Measure),
                // Queued calibration errors drain one per press before the
                // menu becomes reachable again.
                Mode::Message => match self.calibrations.pop_error() {
                    Some(text) => self.enter(ModeRequest::Message {
                        text,
                        kind: MessageKind::Error,
                    }),
                    None => self.enter(ModeRequest::Menu),
                },
                Mode::Abort => {}
            },
            Action::CycleGain => {
                self.gain = self.gain.next();
                if let Some(sensor) = self.sensor.as_mut() {
                    sensor
                        .set_gain(self.gain)
                        .map_err(|e| eyre!("gain change failed: {e}"))?;
                }
                // The old blank was taken at the old gain; invalidate it.
                self.blank = BlankReference::neutral();
                self.is_blanked = false;
                info!(gain = %self.gain, "gain cycled");
            }
            Action::Up => {
                self.navigator.decrement();
                self.refresh_menu_screen();
            }
            Action::Down => {
                self.navigator.increment();
                self.refresh_menu_screen();
            }
            Action::Select => match self.navigator.selected().clone() {
                MenuEntry::About => self.enter(ModeRequest::Message {
                    text: format!("firmware version {FIRMWARE_VERSION}"),
                    kind: MessageKind::About,
                }),
                MenuEntry::Measurement(name) => {
                    info!(measurement = %name, "measurement selected");
                    self.measurement = name;
                    self.enter(ModeRequest::Measure);
                }
            },
            Action::Acknowledge => match self.calibrations.pop_error() {
                Some(text) => self.enter(ModeRequest::Message {
                    text,
                    kind: MessageKind::Error,
                }),
                None => self.enter(ModeRequest::Measure),
            },
        }
        Ok(())
    }

    fn capture_blank(&mut self) -> Result<()> {
        let Some(sensor) = self.sensor.as_mut() else {
            return Ok(());
        };
        if let ActiveScreen::Measure(screen) = &mut self.screen {
            screen.set_blanking();
            screen.show();
        }
        self.blank = BlankReference::capture(
            sensor,
            self.clock.as_ref(),
            self.cfg.blank_samples,
            self.cfg.blank_interval,
        )
        .map_err(|e| eyre!("blank capture failed: {e}"))?;
        self.is_blanked = true;
        info!("blank reference captured");
        Ok(())
    }

    fn render_measure(&mut self) -> Result<()> {
        let Some(sensor) = self.sensor.as_mut() else {
            return Ok(());
        };
        let raw = sensor
            .read_raw()
            .map_err(|e| eyre!("sensor read failed: {e}"))?;
        let max_count = sensor.max_count();

        let rendered = match pipeline::check_overflow(&raw, max_count) {
            Err(_) => None,
            Ok(()) => match self.evaluate(&raw) {
                Ok(rendered) => Some(rendered),
                Err(e) => {
                    // Recover by falling back to absorbance; the reason is
                    // shown once.
                    warn!(error = %e, "measurement failed, reverting to absorbance");
                    self.measurement = MeasurementName::Absorbance;
                    self.enter(ModeRequest::Message {
                        text: e.to_string(),
                        kind: MessageKind::Error,
                    });
                    return Ok(());
                }
            },
        };

        self.battery.update();
        let volts = self.battery.voltage_lowpass();

        if let ActiveScreen::Measure(screen) = &mut self.screen {
            match rendered {
                None => screen.set_overflow(self.measurement.label()),
                Some((values, units)) => screen.set_measurement(
                    self.measurement.label(),
                    units.as_deref(),
                    &values,
                    self.precision,
                ),
            }
            screen.set_blanked(self.is_blanked);
            screen.set_battery(volts);
            screen.set_gain(self.gain);
            screen.show();
        }
        Ok(())
    }

    /// Run the pipeline for the selected measurement.
    fn evaluate(
        &self,
        raw: &colorimeter_traits::RawReading,
    ) -> std::result::Result<(MeasurementValues, Option<String>), MeasureError> {
        match &self.measurement {
            MeasurementName::RawSensor => Ok((MeasurementValues::Raw(*raw), None)),
            MeasurementName::Transmittance => Ok((
                MeasurementValues::PerChannel(pipeline::transmittance(raw, &self.blank)),
                None,
            )),
            MeasurementName::Absorbance => {
                let t = pipeline::transmittance(raw, &self.blank);
                Ok((MeasurementValues::PerChannel(pipeline::absorbance(&t)), None))
            }
            MeasurementName::Calibrated(name) => {
                let t = pipeline::transmittance(raw, &self.blank);
                let a = pipeline::absorbance(&t);
                let (value, entry) = pipeline::calibrated(&self.calibrations, name, &a)?;
                Ok((MeasurementValues::Scalar(value), Some(entry.units.clone())))
            }
        }
    }

    fn refresh_menu_screen(&mut self) {
        let labels = self.menu_labels();
        let (start, window) = self.navigator.window();
        let visible = labels[start..start + window.len()].to_vec();
        let row = self.navigator.cursor_row();
        if let ActiveScreen::Menu(screen) = &mut self.screen {
            screen.set_items(&visible);
            screen.set_cursor(row);
            screen.show();
        }
    }

    /// Numbered labels for every menu item, with calibration entries
    /// annotated by their LED / channel binding.
    fn menu_labels(&self) -> Vec<String> {
        self.navigator
            .items()
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                MenuEntry::Measurement(MeasurementName::Calibrated(name)) => {
                    match self.calibrations.get(name) {
                        Some(cal) => format_calibrated_label(i, name, cal.led.as_deref(), cal.channel),
                        None => format!("{i} {name}"),
                    }
                }
                other => format!("{i} {}", other.label()),
            })
            .collect()
    }
}

/// One menu row for a calibration entry. With both an LED and a channel
/// bound the name is truncated to eight characters to keep the row short.
fn format_calibrated_label(
    index: usize,
    name: &str,
    led: Option<&str>,
    channel: Option<colorimeter_traits::Channel>,
) -> String {
    match (led, channel) {
        (Some(led), Some(ch)) => {
            let short: String = name.chars().take(8).collect();
            format!("{index} {short} ({led},{})", ch.name())
        }
        (Some(led), None) => format!("{index} {name} ({led})"),
        (None, Some(ch)) => format!("{index} {name} ({})", ch.name()),
        (None, None) => format!("{index} {name}"),
    }
}
