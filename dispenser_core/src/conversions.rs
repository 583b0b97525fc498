//! `From` implementations bridging `dispenser_config` types to `dispenser_core` types.

use std::time::Duration;

use crate::calibration::CalibrationParams;
use crate::config::{ButtonCfg, ControllerCfg, DispenseCfg, PurgeCfg};
use crate::input::Thresholds;

// ── ButtonCfg ────────────────────────────────────────────────────────────────

impl From<&dispenser_config::ButtonCfg> for ButtonCfg {
    fn from(c: &dispenser_config::ButtonCfg) -> Self {
        Self {
            thresholds: Thresholds {
                debounce: Duration::from_millis(c.debounce_ms),
                short_max: Duration::from_millis(c.short_max_ms),
                long_min: Duration::from_millis(c.long_min_ms),
            },
            menu_hold: Duration::from_millis(c.menu_hold_ms),
            active_low: c.active_low,
        }
    }
}

// ── CalibrationParams ────────────────────────────────────────────────────────

impl From<&dispenser_config::CalibrationCfg> for CalibrationParams {
    fn from(c: &dispenser_config::CalibrationCfg) -> Self {
        Self {
            total_revolutions: c.total_revolutions,
            steps_per_revolution: c.steps_per_revolution,
            sweep_speed_sps: c.sweep_speed_sps,
        }
    }
}

// ── PurgeCfg / DispenseCfg ───────────────────────────────────────────────────

impl From<&dispenser_config::PurgeCfg> for PurgeCfg {
    fn from(c: &dispenser_config::PurgeCfg) -> Self {
        Self {
            release: Duration::from_millis(c.release_ms),
            speed_sps: c.speed_sps,
        }
    }
}

impl From<&dispenser_config::DispenseCfg> for DispenseCfg {
    fn from(c: &dispenser_config::DispenseCfg) -> Self {
        Self {
            speed_sps: c.speed_sps,
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&dispenser_config::Config> for ControllerCfg {
    fn from(c: &dispenser_config::Config) -> Self {
        Self {
            button: (&c.button).into(),
            calibration: (&c.calibration).into(),
            purge: (&c.purge).into(),
            dispense: (&c.dispense).into(),
            motor_burst: c.runner.motor_burst,
        }
    }
}
