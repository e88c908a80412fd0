//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "colorimeter",
    version,
    about = "Handheld colorimeter firmware on simulated hardware"
)]
pub struct Cli {
    /// Path to the config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/colorimeter.toml")]
    pub config: PathBuf,

    /// Path to the calibrations JSON
    #[arg(long, value_name = "FILE", default_value = "etc/calibrations.json")]
    pub calibrations: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Write logs to this file through a non-blocking appender
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Run this many loop ticks, then exit (0 = run until Ctrl-C)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub ticks: u64,

    /// Uniform simulated illumination, in sensor counts
    #[arg(long, value_name = "COUNTS", default_value_t = 1000)]
    pub illumination: u16,

    /// Simulate a sensor that is absent from the bus
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_sensor: bool,

    /// Button masks to inject while running, comma separated
    /// (hex or decimal, e.g. 0x08,0x20,0x10)
    #[arg(long, value_name = "MASKS")]
    pub buttons: Option<String>,
}
