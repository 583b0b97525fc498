#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core dispenser logic (hardware-agnostic).
//!
//! Everything physical goes through the `dispenser_traits` boundaries:
//! `Stepper` for the pump, `Display` for the 16x2 character LCD,
//! `AnalogInput` for the volume knob and `CalibrationStore` for the single
//! persisted constant.
//!
//! ## Architecture
//!
//! - **Input**: interrupt-side `EdgeSender` feeding a bounded queue drained by
//!   the loop-side `ButtonInput`, which classifies press-release cycles
//!   (`input` module)
//! - **Calibration**: fixed-revolution sweep, volume query and the derived
//!   revolutions-per-ml constant (`calibration` module)
//! - **State machine**: the transition graph (`state`) and the `Controller`
//!   that owns the state and drives the collaborators (`controller`)
//! - **Storage**: file and in-memory calibration slots (`store`)
//!
//! The controller never blocks: each `tick` does a bounded amount of motor and
//! display work and returns.

pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod input;
pub(crate) mod pump;
pub mod state;
pub mod store;

pub use builder::{ControllerBuilder, Missing};
pub use calibration::{CalibrationConstant, CalibrationParams, CalibrationRun, MeasuredVolume};
pub use config::{ButtonCfg, ControllerCfg, DispenseCfg, PurgeCfg};
pub use controller::{Controller, Transition};
pub use error::{BuildError, DispenserError, Report, Result};
pub use input::{ButtonInput, EdgeSender, PressEvent, PressKind, PressMonitor, RawEdge, Thresholds, edge_channel};
pub use state::{SystemState, Trigger, next_state};
pub use store::{FileStore, MemoryStore};
