//! End-to-end controller scenarios driven through the mock hardware and a
//! deterministic clock: button debounce across ticks, menu navigation,
//! blank capture feeding the pipeline, and the boot error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colorimeter_config::{CalibrationSet, Config};
use colorimeter_core::mocks::{
    BrokenSensor, FixedBattery, HeadlessFrontend, MemoryLink, ScriptedPad, ScreenState,
    StaticSensor,
};
use colorimeter_core::{
    Controller, MeasurementName, MeasurementValues, MessageKind, Mode,
};
use colorimeter_traits::clock::test_clock::TestClock;
use colorimeter_traits::{Buttons, Gain, NUM_CHANNELS, RawReading};
use rstest::rstest;

const DEBOUNCE: Duration = Duration::from_millis(600);

struct Rig {
    controller: Controller<StaticSensor, ScriptedPad, FixedBattery, HeadlessFrontend, MemoryLink>,
    clock: TestClock,
    pad: Arc<Mutex<std::collections::VecDeque<Buttons>>>,
    screen: Arc<Mutex<ScreenState>>,
    reading: Arc<Mutex<RawReading>>,
}

impl Rig {
    fn new(config: Config, calibrations: CalibrationSet, counts: u16) -> Self {
        let clock = TestClock::new();
        let sensor = StaticSensor::uniform(counts);
        let reading = sensor.handle();
        let pad = ScriptedPad::new();
        let pad_handle = pad.handle();
        let frontend = HeadlessFrontend::new();
        let screen = frontend.state();

        let controller = Controller::builder()
            .with_sensor(Ok(sensor))
            .with_pad(pad)
            .with_battery(FixedBattery(3.9))
            .with_frontend(frontend)
            .with_link(MemoryLink::default())
            .with_config(Ok(config))
            .with_calibrations(Ok(calibrations))
            .with_clock(Box::new(clock.clone()))
            .build()
            .expect("controller builds");

        Rig {
            controller,
            clock,
            pad: pad_handle,
            screen,
            reading,
        }
    }

    fn plain(counts: u16) -> Self {
        Self::new(Config::default(), CalibrationSet::default(), counts)
    }

    /// Queue a press, clear the debounce window, and run one tick.
    fn press(&mut self, buttons: Buttons) {
        self.clock.advance(DEBOUNCE);
        if let Ok(mut q) = self.pad.lock() {
            q.push_back(buttons);
        }
        self.controller.tick().expect("tick");
    }

    fn set_counts(&self, counts: u16) {
        if let Ok(mut r) = self.reading.lock() {
            *r = [counts; NUM_CHANNELS];
        }
    }

    fn screen_state(&self) -> ScreenState {
        self.screen.lock().expect("screen state").clone()
    }
}

fn nitrate_calibrations() -> CalibrationSet {
    CalibrationSet::from_json(
        r#"{"Nitrate": {"units": "ppm", "led": "630", "channel": "630nm",
            "fit_type": "polynomial", "fit_coef": [10.0, 1.0]}}"#,
    )
    .expect("valid calibrations")
}

#[rstest]
#[case::gain_inert_off_raw_display(Buttons::GAIN, Mode::Measure)]
#[case::itime_reserved(Buttons::ITIME, Mode::Measure)]
#[case::menu_opens(Buttons::MENU, Mode::Menu)]
fn measure_mode_bindings(#[case] mask: Buttons, #[case] expected: Mode) {
    let mut rig = Rig::plain(1000);
    rig.press(mask);
    assert_eq!(rig.controller.mode(), expected);
}

#[test]
fn menu_button_toggles_between_measure_and_menu() {
    let mut rig = Rig::plain(1000);
    assert_eq!(rig.controller.mode(), Mode::Measure);

    rig.press(Buttons::MENU);
    assert_eq!(rig.controller.mode(), Mode::Menu);
    let state = rig.screen_state();
    assert_eq!(state.created, vec!["measure", "menu"]);
    assert_eq!(state.menu_labels[0], "0 Absorbance");

    rig.press(Buttons::MENU);
    assert_eq!(rig.controller.mode(), Mode::Measure);
}

#[test]
fn presses_inside_the_debounce_window_are_dropped() {
    let mut rig = Rig::plain(1000);
    rig.press(Buttons::MENU);
    assert_eq!(rig.controller.mode(), Mode::Menu);

    // Same press again without advancing the clock: swallowed.
    if let Ok(mut q) = rig.pad.lock() {
        q.push_back(Buttons::MENU);
    }
    rig.controller.tick().expect("tick");
    assert_eq!(rig.controller.mode(), Mode::Menu);

    rig.press(Buttons::MENU);
    assert_eq!(rig.controller.mode(), Mode::Measure);
}

#[test]
fn menu_navigation_selects_a_measurement() {
    let mut rig = Rig::plain(1000);
    rig.press(Buttons::MENU);
    rig.press(Buttons::DOWN);
    assert_eq!(rig.screen_state().menu_cursor, Some(1));
    rig.press(Buttons::RIGHT);

    assert_eq!(rig.controller.mode(), Mode::Measure);
    assert_eq!(rig.controller.measurement(), &MeasurementName::Transmittance);
}

#[test]
fn about_entry_shows_the_firmware_version() {
    let mut rig = Rig::plain(1000);
    rig.press(Buttons::MENU);
    // Absorbance, Transmittance, Raw Sensor, About.
    rig.press(Buttons::DOWN);
    rig.press(Buttons::DOWN);
    rig.press(Buttons::DOWN);
    rig.press(Buttons::RIGHT);

    assert_eq!(rig.controller.mode(), Mode::Message);
    let state = rig.screen_state();
    assert_eq!(state.message_kind, Some(MessageKind::About));
    let message = state.message.expect("message text");
    assert!(message.starts_with("firmware version "), "got: {message}");
}

#[test]
fn cursor_clamps_at_the_menu_edges() {
    let mut rig = Rig::plain(1000);
    rig.press(Buttons::MENU);
    rig.press(Buttons::UP);
    assert_eq!(rig.screen_state().menu_cursor, Some(0));
    for _ in 0..10 {
        rig.press(Buttons::DOWN);
    }
    rig.press(Buttons::RIGHT);
    // Overshooting lands on the trailing About entry.
    assert_eq!(rig.controller.mode(), Mode::Message);
}

#[test]
fn run_stops_when_the_flag_is_raised() {
    let mut rig = Rig::plain(1000);
    let stop = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            stop.store(true, Ordering::SeqCst);
        });
        rig.controller.run(&stop).expect("run");
    });
    assert_eq!(rig.controller.mode(), Mode::Measure);
    assert!(rig.screen_state().shows > 0);
}

#[test]
fn menu_and_message_screens_refresh_every_tick() {
    let mut rig = Rig::plain(1000);
    rig.press(Buttons::MENU);
    let shown = rig.screen_state().shows;

    rig.controller.tick().expect("tick");
    rig.controller.tick().expect("tick");
    assert_eq!(rig.screen_state().shows, shown + 2);

    rig.press(Buttons::DOWN);
    rig.press(Buttons::DOWN);
    rig.press(Buttons::DOWN);
    rig.press(Buttons::RIGHT); // About
    assert_eq!(rig.controller.mode(), Mode::Message);
    let shown = rig.screen_state().shows;
    rig.controller.tick().expect("tick");
    assert_eq!(rig.screen_state().shows, shown + 1);
}

#[test]
fn boot_takes_a_preliminary_blank_without_marking_blanked() {
    let mut rig = Rig::plain(1000);
    assert!(!rig.controller.is_blanked());

    rig.set_counts(250);
    rig.press(Buttons::MENU);
    rig.press(Buttons::DOWN);
    rig.press(Buttons::RIGHT); // Transmittance
    rig.controller.tick().expect("tick");

    // Quietly referenced against the boot reading of 1000 counts.
    let state = rig.screen_state();
    match state.values.expect("values") {
        MeasurementValues::PerChannel(t) => {
            assert!((t[0] - 0.25).abs() < 1e-12, "got {}", t[0]);
        }
        other => panic!("expected per-channel values, got {other:?}"),
    }
    assert_eq!(state.blanked, Some(false));
}

#[test]
fn blank_capture_feeds_transmittance() {
    let mut rig = Rig::plain(1000);
    rig.press(Buttons::BLANK);
    assert!(rig.controller.is_blanked());

    rig.set_counts(250);
    rig.press(Buttons::MENU);
    rig.press(Buttons::DOWN);
    rig.press(Buttons::RIGHT); // Transmittance
    rig.controller.tick().expect("tick");

    let state = rig.screen_state();
    assert_eq!(state.measurement_name.as_deref(), Some("Transmittance"));
    match state.values.expect("values") {
        MeasurementValues::PerChannel(t) => {
            assert!((t[0] - 0.25).abs() < 1e-12, "got {}", t[0]);
        }
        other => panic!("expected per-channel values, got {other:?}"),
    }
    assert_eq!(state.blanked, Some(true));
}

#[test]
fn gain_cycle_invalidates_the_blank() {
    let config = colorimeter_config::load_toml("startup = \"Raw Sensor\"").expect("config");
    let mut rig = Rig::new(config, CalibrationSet::default(), 1000);
    assert_eq!(rig.controller.measurement(), &MeasurementName::RawSensor);
    assert_eq!(rig.controller.gain(), Gain::X16);

    rig.press(Buttons::GAIN);
    assert_eq!(rig.controller.gain(), Gain::X32);
    assert!(!rig.controller.is_blanked());
}

#[test]
fn blank_button_is_inert_on_the_raw_display() {
    let config = colorimeter_config::load_toml("startup = \"Raw Sensor\"").expect("config");
    let mut rig = Rig::new(config, CalibrationSet::default(), 1000);
    rig.press(Buttons::BLANK);
    assert!(!rig.controller.is_blanked());
}

#[test]
fn overflow_replaces_the_value_area() {
    let mut rig = Rig::plain(65535);
    rig.controller.tick().expect("tick");
    let state = rig.screen_state();
    assert_eq!(state.overflow.as_deref(), Some("Absorbance"));
}

#[test]
fn calibrated_measurement_renders_a_scalar_with_units() {
    let config = colorimeter_config::load_toml("startup = \"Nitrate\"").expect("config");
    let mut rig = Rig::new(config, nitrate_calibrations(), 1000);
    rig.press(Buttons::BLANK);
    rig.set_counts(100);
    rig.controller.tick().expect("tick");

    let state = rig.screen_state();
    assert_eq!(state.measurement_name.as_deref(), Some("Nitrate"));
    assert_eq!(state.units.as_deref(), Some("ppm"));
    // t = 0.1 everywhere, absorbance 1.0, fit 10 * a + 1.
    match state.values.expect("values") {
        MeasurementValues::Scalar(v) => assert!((v - 11.0).abs() < 1e-9, "got {v}"),
        other => panic!("expected a scalar, got {other:?}"),
    }
}

#[test]
fn unbound_calibration_falls_back_to_absorbance() {
    let cals = CalibrationSet::from_json(
        r#"{"Loose": {"units": "ppm", "fit_type": "polynomial", "fit_coef": [1.0, 0.0]}}"#,
    )
    .expect("valid json");
    let config = colorimeter_config::load_toml("startup = \"Loose\"").expect("config");
    let mut rig = Rig::new(config, cals, 1000);

    rig.controller.tick().expect("tick");
    assert_eq!(rig.controller.mode(), Mode::Message);
    assert_eq!(rig.controller.measurement(), &MeasurementName::Absorbance);
    let state = rig.screen_state();
    assert!(
        state.message.as_deref().is_some_and(|m| m.contains("not bound to a channel")),
        "got: {:?}",
        state.message
    );
}

#[test]
fn acknowledge_drains_the_calibration_error_queue_in_order() {
    let cals = CalibrationSet::from_json(
        r#"{
            "first": {"units": "", "fit_type": "polynomial", "fit_coef": [1.0]},
            "second": {"units": "ppm", "fit_type": "spline", "fit_coef": [1.0]},
            "good": {"units": "ppm", "fit_type": "polynomial", "fit_coef": [1.0, 0.0]}
        }"#,
    )
    .expect("valid json");
    assert_eq!(cals.error_count(), 2);
    let mut rig = Rig::new(Config::default(), cals, 1000);

    assert_eq!(rig.controller.mode(), Mode::Message);
    assert_eq!(
        rig.screen_state().message.as_deref(),
        Some("errors found in calibrations file")
    );

    rig.press(Buttons::LEFT);
    assert_eq!(rig.controller.mode(), Mode::Message);
    let first = rig.screen_state().message.expect("first error");
    assert!(first.starts_with("calibration 'first':"), "got: {first}");

    rig.press(Buttons::LEFT);
    let second = rig.screen_state().message.expect("second error");
    assert!(second.starts_with("calibration 'second':"), "got: {second}");

    rig.press(Buttons::LEFT);
    assert_eq!(rig.controller.mode(), Mode::Measure);
}

#[test]
fn menu_button_also_drains_queued_errors_before_leaving_message() {
    let cals = CalibrationSet::from_json(
        r#"{
            "bad": {"units": "", "fit_type": "polynomial", "fit_coef": [1.0]},
            "good": {"units": "ppm", "fit_type": "polynomial", "fit_coef": [1.0, 0.0]}
        }"#,
    )
    .expect("valid json");
    let mut rig = Rig::new(Config::default(), cals, 1000);
    assert_eq!(rig.controller.mode(), Mode::Message);

    rig.press(Buttons::MENU);
    assert_eq!(rig.controller.mode(), Mode::Message);
    let queued = rig.screen_state().message.expect("queued error");
    assert!(queued.starts_with("calibration 'bad':"), "got: {queued}");

    rig.press(Buttons::MENU);
    assert_eq!(rig.controller.mode(), Mode::Menu);
}

#[test]
fn abort_mode_ignores_every_button() {
    let clock = TestClock::new();
    let pad = ScriptedPad::new();
    let pad_handle = pad.handle();
    let mut controller = Controller::builder()
        .with_sensor(Ok(BrokenSensor))
        .with_pad(pad)
        .with_battery(FixedBattery(3.9))
        .with_frontend(HeadlessFrontend::new())
        .with_link(MemoryLink::default())
        .with_config(Ok(Config::default()))
        .with_calibrations(Ok(CalibrationSet::default()))
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("builds");
    assert_eq!(controller.mode(), Mode::Abort);

    for mask in [Buttons::MENU, Buttons::BLANK, Buttons::LEFT, Buttons::RIGHT] {
        clock.advance(DEBOUNCE);
        if let Ok(mut q) = pad_handle.lock() {
            q.push_back(mask);
        }
        controller.tick().expect("tick");
        assert_eq!(controller.mode(), Mode::Abort);
    }
}

#[test]
fn read_command_includes_blanks_only_after_blanking() {
    let mut rig = Rig::plain(800);
    rig.controller.link_mut().feed(b"{\"command\": \"read\"}\n");
    rig.controller.tick().expect("tick");

    rig.press(Buttons::BLANK);
    rig.controller.link_mut().feed(b"{\"command\": \"read\"}\n");
    rig.controller.tick().expect("tick");

    let sent = rig.controller.link_mut().sent.clone();
    assert_eq!(sent.len(), 2);
    let before: serde_json::Value = serde_json::from_str(&sent[0]).expect("json");
    assert!(before["response"].get("blanks").is_none());
    let after: serde_json::Value = serde_json::from_str(&sent[1]).expect("json");
    assert_eq!(after["response"]["blanks"]["415nm"], 800.0);
    assert_eq!(after["response"]["values"]["clear"], 800);
}

#[test]
fn malformed_lines_are_counted_not_answered() {
    let mut rig = Rig::plain(800);
    rig.controller.link_mut().feed(b"}{ nonsense\n");
    rig.controller.tick().expect("tick");
    assert_eq!(rig.controller.decode_error_count(), 1);
    assert!(rig.controller.link_mut().sent.is_empty());
}
