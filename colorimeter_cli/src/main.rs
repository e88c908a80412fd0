//! Binary entry point: wires the simulated hardware, config files, and
//! console frontend into the controller and runs the firmware loop.

mod cli;
mod link;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::{Result, WrapErr, eyre};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use colorimeter_config::{CalibrationSet, load_config};
use colorimeter_core::{Controller, ControllerCfg, Mode};
use colorimeter_hardware::{SimulatedBattery, SimulatedButtonPad, SimulatedLightSensor};
use colorimeter_traits::Buttons;
use colorimeter_ui::ConsoleFrontend;

use crate::cli::{Cli, FILE_GUARD};
use crate::link::StdioLink;

/// Ticks between injected scripted presses; spaced wider than the button
/// debounce window so every press registers.
const PRESS_SPACING_TICKS: u64 = 65;

fn init_tracing(args: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .wrap_err("invalid log level")?;

    let writer = match &args.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file = path
                .file_name()
                .ok_or_else(|| eyre!("log file path has no file name"))?;
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                file,
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            BoxMakeWriter::new(non_blocking)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if args.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Parse a comma-separated button mask script, hex or decimal.
fn parse_button_script(script: &str) -> Result<Vec<Buttons>> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => s.parse::<u8>(),
            };
            value
                .map(Buttons)
                .map_err(|_| eyre!("invalid button mask '{s}'"))
        })
        .collect()
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    init_tracing(&args)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .wrap_err("failed to install Ctrl-C handler")?;
    }

    let script = match args.buttons.as_deref() {
        Some(s) => parse_button_script(s)?,
        None => Vec::new(),
    };

    let sensor = if args.no_sensor {
        SimulatedLightSensor::disconnected()
    } else {
        SimulatedLightSensor::uniform(args.illumination)
    };
    let pad = SimulatedButtonPad::new();
    let injector = pad.injector();

    let mut controller = Controller::builder()
        .with_sensor(Ok(sensor))
        .with_pad(pad)
        .with_battery(SimulatedBattery::default())
        .with_frontend(ConsoleFrontend::stderr())
        .with_link(StdioLink::new())
        .with_config(load_config(&args.config))
        .with_calibrations(CalibrationSet::load(&args.calibrations))
        .build()?;

    if controller.mode() == Mode::Abort {
        tracing::error!("device aborted at boot; serial stays responsive");
    }

    // The plain interactive path is the controller's own loop; scripted or
    // tick-bounded runs need the injection scaffolding in `run_loop`.
    let outcome = if args.ticks == 0 && script.is_empty() {
        controller.run(&shutdown)
    } else {
        run_loop(&mut controller, &shutdown, args.ticks, &script, &injector)
    };
    match outcome {
        Ok(()) => Ok(()),
        Err(err) => {
            if args.json {
                eprintln!(
                    "{}",
                    serde_json::json!({ "reason": "Error", "message": err.to_string() })
                );
            }
            Err(err)
        }
    }
}

fn run_loop<S, P, B, F, L>(
    controller: &mut Controller<S, P, B, F, L>,
    shutdown: &AtomicBool,
    max_ticks: u64,
    script: &[Buttons],
    injector: &colorimeter_hardware::ButtonInjector,
) -> Result<()>
where
    S: colorimeter_traits::LightSensor,
    P: colorimeter_traits::ButtonPad,
    B: colorimeter_traits::BatteryMonitor,
    F: colorimeter_core::ScreenFactory,
    L: colorimeter_traits::SerialLink,
{
    let loop_interval: Duration = ControllerCfg::default().loop_interval;
    let mut presses = script.iter();
    let mut tick: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) && (max_ticks == 0 || tick < max_ticks) {
        if tick % PRESS_SPACING_TICKS == 0
            && let Some(&mask) = presses.next()
        {
            injector.press(mask);
        }
        controller.tick()?;
        std::thread::sleep(loop_interval);
        tick += 1;
    }
    tracing::info!(ticks = tick, "run loop finished");
    Ok(())
}
