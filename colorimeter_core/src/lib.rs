#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Controller core for the handheld multi-channel colorimeter.
//!
//! Hardware-agnostic: the sensor, button pad, battery monitor, display
//! frontend, and serial link all come in through `colorimeter_traits`.
//!
//! ## Architecture
//!
//! - **Pipeline**: raw counts → transmittance → absorbance → calibrated
//!   value, plus median blank capture (`pipeline` module)
//! - **Controller**: mode state machine and the single-threaded run loop
//!   (`controller` module)
//! - **Input**: debounced, mode-scoped button decoding (`input` module)
//! - **Menu**: pagination cursor over the measurement list (`menu` module)
//! - **Command**: line-delimited JSON serial protocol (`command` module)

pub mod command;
pub mod controller;
pub mod error;
pub mod input;
pub mod measurement;
pub mod menu;
pub mod mocks;
pub mod pipeline;
pub mod screen;

pub use controller::{Controller, ControllerBuilder, ControllerCfg, Mode, ModeRequest};
pub use error::{BuildError, MeasureError, SensorInitError};
pub use measurement::{MeasurementName, MeasurementValues};
pub use pipeline::{BlankReference, ChannelValues};
pub use screen::{MeasureScreen, MenuScreen, MessageKind, MessageScreen, ScreenFactory};

/// Version string shown by the About menu entry.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
