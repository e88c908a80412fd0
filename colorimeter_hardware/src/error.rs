use thiserror::Error;

/// Hardware-level failures surfaced through the sensor boundary.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("sensor not connected")]
    Disconnected,
}
