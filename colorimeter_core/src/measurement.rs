//! Measurement selection and the values handed to the measure screen.

use colorimeter_traits::RawReading;

use crate::pipeline::ChannelValues;

pub const ABSORBANCE_LABEL: &str = "Absorbance";
pub const TRANSMITTANCE_LABEL: &str = "Transmittance";
pub const RAW_SENSOR_LABEL: &str = "Raw Sensor";

/// The currently selected measurement: one of the built-in kinds or a
/// calibration entry keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementName {
    Absorbance,
    Transmittance,
    RawSensor,
    Calibrated(String),
}

impl MeasurementName {
    pub fn label(&self) -> &str {
        match self {
            MeasurementName::Absorbance => ABSORBANCE_LABEL,
            MeasurementName::Transmittance => TRANSMITTANCE_LABEL,
            MeasurementName::RawSensor => RAW_SENSOR_LABEL,
            MeasurementName::Calibrated(name) => name,
        }
    }

    /// Whether raw sensor counts are being displayed; gain and
    /// integration-time buttons act only in this state.
    pub fn is_raw_sensor(&self) -> bool {
        matches!(self, MeasurementName::RawSensor)
    }
}

impl std::fmt::Display for MeasurementName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the measure screen renders for one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementValues {
    /// Integer channel counts, shown directly (no blank/absorbance math).
    Raw(RawReading),
    /// One value per channel (transmittance or absorbance).
    PerChannel(ChannelValues),
    /// A single calibrated value in the entry's units.
    Scalar(f64),
}
