//! Runtime configuration for the controller.
//!
//! These are separate from the TOML-deserialized config in `dispenser_config`;
//! see `conversions` for the mapping.
use std::time::Duration;

use crate::calibration::CalibrationParams;
use crate::input::Thresholds;

/// Button timing and polarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonCfg {
    pub thresholds: Thresholds,
    /// Calibration menu: presses at least this long select purge.
    pub menu_hold: Duration,
    pub active_low: bool,
}

impl Default for ButtonCfg {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            menu_hold: Duration::from_millis(2000),
            active_low: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurgeCfg {
    /// Continuous release that ends a purge.
    pub release: Duration,
    pub speed_sps: f32,
}

impl Default for PurgeCfg {
    fn default() -> Self {
        Self {
            release: Duration::from_millis(2000),
            speed_sps: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispenseCfg {
    pub speed_sps: f32,
}

impl Default for DispenseCfg {
    fn default() -> Self {
        Self { speed_sps: 400.0 }
    }
}

/// Everything the controller needs besides its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCfg {
    pub button: ButtonCfg,
    pub calibration: CalibrationParams,
    pub purge: PurgeCfg,
    pub dispense: DispenseCfg,
    /// Motor advance calls per tick.
    pub motor_burst: u32,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            button: ButtonCfg::default(),
            calibration: CalibrationParams::default(),
            purge: PurgeCfg::default(),
            dispense: DispenseCfg::default(),
            motor_burst: 64,
        }
    }
}
