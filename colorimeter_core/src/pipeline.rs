//! The measurement pipeline: raw counts → transmittance → absorbance →
//! calibrated value, plus blank capture.
//!
//! All clipping happens here so the rest of the controller only ever sees
//! transmittance in [0, 1] and non-negative absorbance.

use std::error::Error;
use std::time::Duration;

use colorimeter_config::{CalibrationEntry, CalibrationSet};
use colorimeter_traits::{Channel, Clock, LightSensor, NUM_CHANNELS, RawReading};

use crate::error::MeasureError;

/// One floating-point value per sensor channel.
pub type ChannelValues = [f64; NUM_CHANNELS];

/// Fail with `Overflow` when any channel reads at/above the sensor's
/// maximum count.
pub fn check_overflow(raw: &RawReading, max_count: u16) -> Result<(), MeasureError> {
    if raw.iter().any(|&c| c >= max_count) {
        return Err(MeasureError::Overflow);
    }
    Ok(())
}

/// Elementwise `raw / blank`, clipped to 1.0: transmittance cannot
/// physically exceed the blank, so any excess is attributed to noise.
pub fn transmittance(raw: &RawReading, blank: &BlankReference) -> ChannelValues {
    let mut out = [0.0; NUM_CHANNELS];
    for (i, t) in out.iter_mut().enumerate() {
        *t = (f64::from(raw[i]) / blank.values()[i]).min(1.0);
    }
    out
}

/// Ceiling for computed absorbance. A 16-bit count against a full-scale
/// blank resolves at most `-log10(1/65535)`, about 4.82 AU; a fully dark
/// channel (zero counts) clamps here instead of going to infinity.
pub const MAX_ABSORBANCE: f64 = 5.0;

/// Elementwise `-log10(t)`, clipped to `[0.0, MAX_ABSORBANCE]`.
pub fn absorbance(transmittance: &ChannelValues) -> ChannelValues {
    let mut out = [0.0; NUM_CHANNELS];
    for (i, a) in out.iter_mut().enumerate() {
        *a = (-transmittance[i].log10()).clamp(0.0, MAX_ABSORBANCE);
    }
    out
}

/// Apply the named calibration entry to the absorbance vector.
///
/// Returns the calibrated value together with the entry so the caller can
/// render its units.
pub fn calibrated<'a>(
    calibrations: &'a CalibrationSet,
    name: &str,
    absorbances: &ChannelValues,
) -> Result<(f64, &'a CalibrationEntry), MeasureError> {
    let entry = calibrations
        .get(name)
        .ok_or_else(|| MeasureError::CalibrationApply {
            name: name.to_string(),
            reason: "no matching calibration".into(),
        })?;
    let channel = entry
        .channel
        .ok_or_else(|| MeasureError::CalibrationApply {
            name: name.to_string(),
            reason: "not bound to a channel".into(),
        })?;
    Ok((entry.apply(absorbances[channel.index()]), entry))
}

/// The blank reference readings are normalized against.
///
/// Computed as the elementwise median of several raw samples (robust to
/// transient flicker), with any non-positive element replaced by 1.0 as a
/// divide-by-zero guard.
#[derive(Debug, Clone, PartialEq)]
pub struct BlankReference([f64; NUM_CHANNELS]);

impl BlankReference {
    /// All-ones placeholder used before the boot capture runs and after a
    /// gain change invalidates the previous reference.
    pub fn neutral() -> Self {
        BlankReference([1.0; NUM_CHANNELS])
    }

    pub fn values(&self) -> &[f64; NUM_CHANNELS] {
        &self.0
    }

    pub fn channel(&self, ch: Channel) -> f64 {
        self.0[ch.index()]
    }

    /// Sample the sensor `samples` times, `interval` apart, and build the
    /// median reference. This deliberately stalls the caller for
    /// `samples x interval`; the handheld has no other pending work.
    pub fn capture<S, C>(
        sensor: &mut S,
        clock: &C,
        samples: usize,
        interval: Duration,
    ) -> Result<Self, Box<dyn Error + Send + Sync>>
    where
        S: LightSensor,
        C: Clock + ?Sized,
    {
        let samples = samples.max(1);
        let mut readings = Vec::with_capacity(samples);
        for _ in 0..samples {
            readings.push(sensor.read_raw()?);
            clock.sleep(interval);
        }
        Ok(Self::from_samples(&readings))
    }

    /// Elementwise median with the positive floor applied.
    pub fn from_samples(samples: &[RawReading]) -> Self {
        debug_assert!(!samples.is_empty(), "blank capture needs samples");
        let mut blank = [1.0; NUM_CHANNELS];
        if samples.is_empty() {
            return BlankReference(blank);
        }
        let mut column = Vec::with_capacity(samples.len());
        for (i, b) in blank.iter_mut().enumerate() {
            column.clear();
            column.extend(samples.iter().map(|s| s[i]));
            column.sort_unstable();
            let n = column.len();
            let median = if n % 2 == 1 {
                f64::from(column[n / 2])
            } else {
                (f64::from(column[n / 2 - 1]) + f64::from(column[n / 2])) / 2.0
            };
            *b = if median > 0.0 { median } else { 1.0 };
        }
        BlankReference(blank)
    }
}
