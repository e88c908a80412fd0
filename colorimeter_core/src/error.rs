//! Typed errors, split by lifetime: per-reading recoverable conditions
//! (`MeasureError`) never change mode, while `SensorInitError` is a
//! one-time fatal path evaluated only at boot.

use thiserror::Error;

/// Recoverable per-reading failures; they alter only the current render.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeasureError {
    /// A channel read at or above the sensor's maximum count.
    #[error("sensor overflow")]
    Overflow,
    /// The selected calibrated measurement could not be applied.
    #[error("calibration '{name}': {reason}")]
    CalibrationApply { name: String, reason: String },
}

/// Boot-time sensor probe failure; routes the controller into Abort.
#[derive(Debug, Error, Clone)]
#[error("missing sensor? {0}")]
pub struct SensorInitError(pub String);

/// Missing parts at controller construction.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sensor")]
    MissingSensor,
    #[error("missing button pad")]
    MissingPad,
    #[error("missing battery monitor")]
    MissingBattery,
    #[error("missing screen factory")]
    MissingFrontend,
    #[error("missing serial link")]
    MissingLink,
    #[error("missing configuration")]
    MissingConfig,
    #[error("missing calibrations")]
    MissingCalibrations,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
