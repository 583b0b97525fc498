#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the dispenser controller.
//!
//! `Config` and its sections are deserialized from TOML and checked by
//! `Config::validate`. Every section except `[pins]` has defaults matching the
//! stock 16x2 LCD / 400-step pump build.
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// Push button, BCM numbering. Idles high through the pull-up.
    pub button: u8,
    pub motor_step: u8,
    pub motor_dir: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ButtonCfg {
    /// Presses shorter than this are contact bounce and produce no event.
    pub debounce_ms: u64,
    /// Upper bound of a deliberate short press. Presses between this and
    /// `long_min_ms` still count as short.
    pub short_max_ms: u64,
    /// Presses at least this long are long presses.
    pub long_min_ms: u64,
    /// In the calibration menu, a press this long selects purge instead of calibrate.
    pub menu_hold_ms: u64,
    /// Pressed pulls the line low.
    pub active_low: bool,
}

impl Default for ButtonCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            short_max_ms: 1500,
            long_min_ms: 5000,
            menu_hold_ms: 2000,
            active_low: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Pump revolutions per calibration sweep
    pub total_revolutions: u32,
    /// Full steps per revolution including microstepping
    pub steps_per_revolution: u32,
    pub sweep_speed_sps: f32,
    /// Full-scale reading of the volume potentiometer ADC
    pub analog_max: u16,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            total_revolutions: 10,
            steps_per_revolution: 400,
            sweep_speed_sps: 400.0,
            analog_max: 1023,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PurgeCfg {
    /// Continuous release time that ends a purge
    pub release_ms: u64,
    pub speed_sps: f32,
}

impl Default for PurgeCfg {
    fn default() -> Self {
        Self {
            release_ms: 2000,
            speed_sps: 800.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispenseCfg {
    pub speed_sps: f32,
}

impl Default for DispenseCfg {
    fn default() -> Self {
        Self { speed_sps: 400.0 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Scheduler tick period in microseconds
    pub tick_us: u64,
    /// Motor advance calls per tick while motion is outstanding
    pub motor_burst: u32,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            tick_us: 500,
            motor_burst: 64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreCfg {
    /// File holding the persisted revolutions-per-ml constant
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "var/calibration.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub button: ButtonCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub purge: PurgeCfg,
    #[serde(default)]
    pub dispense: DispenseCfg,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub store: StoreCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn positive_speed(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Button timing
        let b = &self.button;
        if b.debounce_ms == 0 {
            eyre::bail!("button.debounce_ms must be >= 1");
        }
        if b.short_max_ms <= b.debounce_ms {
            eyre::bail!("button.short_max_ms must be > button.debounce_ms");
        }
        if b.long_min_ms < b.short_max_ms {
            eyre::bail!("button.long_min_ms must be >= button.short_max_ms");
        }
        if b.menu_hold_ms <= b.debounce_ms {
            eyre::bail!("button.menu_hold_ms must be > button.debounce_ms");
        }
        if b.long_min_ms > 60 * 1000 {
            eyre::bail!("button.long_min_ms is unreasonably large (>60s)");
        }

        // Calibration
        let c = &self.calibration;
        if c.total_revolutions == 0 {
            eyre::bail!("calibration.total_revolutions must be >= 1");
        }
        if c.steps_per_revolution == 0 {
            eyre::bail!("calibration.steps_per_revolution must be >= 1");
        }
        if !positive_speed(c.sweep_speed_sps) {
            eyre::bail!("calibration.sweep_speed_sps must be > 0");
        }
        if c.analog_max == 0 {
            eyre::bail!("calibration.analog_max must be >= 1");
        }

        // Purge
        if self.purge.release_ms == 0 {
            eyre::bail!("purge.release_ms must be >= 1");
        }
        if !positive_speed(self.purge.speed_sps) {
            eyre::bail!("purge.speed_sps must be > 0");
        }

        // Dispense
        if !positive_speed(self.dispense.speed_sps) {
            eyre::bail!("dispense.speed_sps must be > 0");
        }

        // Runner
        if self.runner.tick_us == 0 {
            eyre::bail!("runner.tick_us must be >= 1");
        }
        if self.runner.motor_burst == 0 {
            eyre::bail!("runner.motor_burst must be >= 1");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }

        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
