#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Persisted configuration and the calibration store.
//!
//! - `Config` is deserialized from TOML and validated; only the fields the
//!   controller consumes are modeled (`startup`, `gain`, `precision`).
//! - `CalibrationSet` loads the device's `calibrations.json`. Entries that
//!   fail validation are skipped and their reasons queued in load order;
//!   the controller drains that queue one message per accepted button
//!   press while in Message mode.

use std::collections::VecDeque;
use std::path::Path;

use colorimeter_traits::{Channel, Gain};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Consumed configuration fields. Everything is optional; `precision`
/// falls back to two decimal places.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    /// Measurement name selected at boot, when it exists in the menu.
    pub startup: Option<String>,
    /// Persisted gain label, resolved by direct lookup into the gain set.
    pub gain: Option<String>,
    /// Decimal places for rendered measurement values.
    pub precision: Option<u8>,
}

pub const DEFAULT_PRECISION: u8 = 2;
const MAX_PRECISION: u8 = 6;

impl Config {
    pub fn precision(&self) -> u8 {
        self.precision.unwrap_or(DEFAULT_PRECISION)
    }

    /// Resolved gain, if one was configured. `validate()` has already
    /// rejected unknown labels.
    pub fn gain_setting(&self) -> Option<Gain> {
        self.gain.as_deref().and_then(Gain::from_label)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(p) = self.precision
            && p > MAX_PRECISION
        {
            return Err(ConfigError::Invalid(format!(
                "precision must be <= {MAX_PRECISION}, got {p}"
            )));
        }
        if let Some(label) = self.gain.as_deref()
            && Gain::from_label(label).is_none()
        {
            return Err(ConfigError::Invalid(format!("unknown gain '{label}'")));
        }
        Ok(())
    }
}

pub fn load_toml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = toml::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_toml(&text)
}

// ── Calibrations ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CalibrationsError {
    #[error("failed to read calibrations file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse calibrations: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("calibrations file must contain a JSON object")]
    NotAnObject,
}

/// Ordered FIFO of human-readable validation errors with defined pop
/// semantics, consumed by the Message-mode draining transition.
#[derive(Debug, Default, Clone)]
pub struct ErrorQueue {
    queue: VecDeque<String>,
}

impl ErrorQueue {
    pub fn push(&mut self, msg: String) {
        self.queue.push_back(msg);
    }

    /// Remove and return the oldest error.
    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// A named mapping from absorbance to a physical unit, bound to an
/// optional LED / channel pairing.
#[derive(Debug, Clone)]
pub struct CalibrationEntry {
    pub name: String,
    pub led: Option<String>,
    pub channel: Option<Channel>,
    pub units: String,
    /// Polynomial coefficients, highest order first.
    pub fit_coef: Vec<f64>,
}

impl CalibrationEntry {
    /// Evaluate the fit at the given absorbance (Horner form).
    pub fn apply(&self, absorbance: f64) -> f64 {
        self.fit_coef
            .iter()
            .fold(0.0, |acc, c| acc * absorbance + c)
    }
}

/// The calibration entries loaded at boot, in file order, plus the queue
/// of per-entry validation errors encountered while loading.
#[derive(Debug, Default, Clone)]
pub struct CalibrationSet {
    entries: Vec<CalibrationEntry>,
    errors: ErrorQueue,
}

impl CalibrationSet {
    pub fn from_json(text: &str) -> Result<CalibrationSet, CalibrationsError> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        let Some(map) = root.as_object() else {
            return Err(CalibrationsError::NotAnObject);
        };

        let mut set = CalibrationSet::default();
        for (name, spec) in map {
            match parse_entry(name, spec) {
                Ok(entry) => set.entries.push(entry),
                Err(reason) => {
                    tracing::warn!(calibration = %name, %reason, "skipping invalid calibration");
                    set.errors.push(format!("calibration '{name}': {reason}"));
                }
            }
        }
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<CalibrationSet, CalibrationsError> {
        let text = std::fs::read_to_string(path).map_err(|source| CalibrationsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn get(&self, name: &str) -> Option<&CalibrationEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entry names in load order (the menu order).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn pop_error(&mut self) -> Option<String> {
        self.errors.pop()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

fn parse_entry(name: &str, spec: &serde_json::Value) -> Result<CalibrationEntry, String> {
    let obj = spec.as_object().ok_or("entry is not an object")?;

    let units = obj
        .get("units")
        .and_then(|v| v.as_str())
        .ok_or("missing units")?;
    if units.is_empty() {
        return Err("units must not be empty".into());
    }

    let fit_type = obj
        .get("fit_type")
        .and_then(|v| v.as_str())
        .ok_or("missing fit_type")?;
    if fit_type != "polynomial" {
        return Err(format!("unsupported fit_type '{fit_type}'"));
    }

    let coef_values = obj
        .get("fit_coef")
        .and_then(|v| v.as_array())
        .ok_or("missing fit_coef")?;
    if coef_values.is_empty() {
        return Err("fit_coef must not be empty".into());
    }
    let mut fit_coef = Vec::with_capacity(coef_values.len());
    for v in coef_values {
        let c = v.as_f64().ok_or("fit_coef contains a non-number")?;
        if !c.is_finite() {
            return Err("fit_coef contains a non-finite value".into());
        }
        fit_coef.push(c);
    }

    let led = match obj.get("led") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => return Err("led must be a string".into()),
    };

    let channel = match obj.get("channel") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(
            Channel::from_name(s).ok_or_else(|| format!("unknown channel '{s}'"))?,
        ),
        Some(_) => return Err("channel must be a channel name string".into()),
    };

    Ok(CalibrationEntry {
        name: name.to_string(),
        led,
        channel,
        units: units.to_string(),
        fit_coef,
    })
}
