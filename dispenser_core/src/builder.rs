//! Type-state builder for `Controller`.
//!
//! `build()` only exists once a motor, display, analog input and store have
//! been supplied. The button input and clock are checked when building.

use std::collections::VecDeque;
use std::sync::Arc;

use dispenser_traits::{AnalogInput, CalibrationStore, Clock, Display, MonotonicClock, Stepper};

use crate::calibration::load_constant;
use crate::config::ControllerCfg;
use crate::controller::Controller;
use crate::error::{BuildError, Result};
use crate::input::ButtonInput;
use crate::pump::Pump;
use crate::state::SystemState;

/// Placeholder for a collaborator not yet supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct Missing;

/// Builder for `Controller`. Configuration is validated on `build()`.
pub struct ControllerBuilder<M, D, A, S> {
    motor: M,
    display: D,
    analog: A,
    store: S,
    input: Option<ButtonInput>,
    cfg: Option<ControllerCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for ControllerBuilder<Missing, Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            motor: Missing,
            display: Missing,
            analog: Missing,
            store: Missing,
            input: None,
            cfg: None,
            clock: None,
        }
    }
}

impl Controller<Missing, Missing, Missing, Missing> {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder<Missing, Missing, Missing, Missing> {
        ControllerBuilder::default()
    }
}

/// Chainable setters that do not affect type-state.
impl<M, D, A, S> ControllerBuilder<M, D, A, S> {
    pub fn with_input(mut self, input: ButtonInput) -> Self {
        self.input = Some(input);
        self
    }
    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }
    /// Share the clock used by the button's edge sender; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<D, A, S> ControllerBuilder<Missing, D, A, S> {
    pub fn with_motor<M: Stepper>(self, motor: M) -> ControllerBuilder<M, D, A, S> {
        ControllerBuilder {
            motor,
            display: self.display,
            analog: self.analog,
            store: self.store,
            input: self.input,
            cfg: self.cfg,
            clock: self.clock,
        }
    }
}

impl<M, A, S> ControllerBuilder<M, Missing, A, S> {
    pub fn with_display<D: Display>(self, display: D) -> ControllerBuilder<M, D, A, S> {
        ControllerBuilder {
            motor: self.motor,
            display,
            analog: self.analog,
            store: self.store,
            input: self.input,
            cfg: self.cfg,
            clock: self.clock,
        }
    }
}

impl<M, D, S> ControllerBuilder<M, D, Missing, S> {
    pub fn with_analog<A: AnalogInput>(self, analog: A) -> ControllerBuilder<M, D, A, S> {
        ControllerBuilder {
            motor: self.motor,
            display: self.display,
            analog,
            store: self.store,
            input: self.input,
            cfg: self.cfg,
            clock: self.clock,
        }
    }
}

impl<M, D, A> ControllerBuilder<M, D, A, Missing> {
    pub fn with_store<S: CalibrationStore>(self, store: S) -> ControllerBuilder<M, D, A, S> {
        ControllerBuilder {
            motor: self.motor,
            display: self.display,
            analog: self.analog,
            store,
            input: self.input,
            cfg: self.cfg,
            clock: self.clock,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(cfg: &ControllerCfg, input: &ButtonInput) -> Result<()> {
    let t = &cfg.button.thresholds;
    if t.debounce.is_zero() {
        return Err(invalid("debounce must be > 0"));
    }
    if t.debounce >= t.short_max {
        return Err(invalid("debounce must be below short_max"));
    }
    if t.short_max > t.long_min {
        return Err(invalid("short_max must not exceed long_min"));
    }
    if cfg.button.menu_hold <= t.debounce {
        return Err(invalid("menu_hold must exceed debounce"));
    }
    if input.thresholds() != t {
        return Err(invalid("button input thresholds differ from controller config"));
    }
    if cfg.calibration.total_revolutions == 0 || cfg.calibration.steps_per_revolution == 0 {
        return Err(invalid("calibration sweep must be > 0 steps"));
    }
    for sps in [
        cfg.calibration.sweep_speed_sps,
        cfg.purge.speed_sps,
        cfg.dispense.speed_sps,
    ] {
        if !sps.is_finite() || sps <= 0.0 {
            return Err(invalid("motor speeds must be finite and > 0"));
        }
    }
    if cfg.purge.release.is_zero() {
        return Err(invalid("purge release must be > 0"));
    }
    if cfg.motor_burst == 0 {
        return Err(invalid("motor_burst must be >= 1"));
    }
    Ok(())
}

impl<M, D, A, S> ControllerBuilder<M, D, A, S>
where
    M: Stepper,
    D: Display,
    A: AnalogInput,
    S: CalibrationStore,
{
    /// Validate, read the stored constant, and construct the controller in `Idle`.
    pub fn build(self) -> Result<Controller<M, D, A, S>> {
        let input = self
            .input
            .ok_or_else(|| eyre::Report::new(BuildError::MissingInput))?;
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg, &input)?;

        let constant = load_constant(&self.store)?;
        match constant {
            Some(c) => tracing::info!(revolutions_per_ml = c.revolutions_per_ml(), "calibration loaded"),
            None => tracing::info!("no stored calibration"),
        }
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let pump = Pump::new(cfg.calibration.steps_per_revolution);

        Ok(Controller {
            motor: self.motor,
            display: self.display,
            analog: self.analog,
            store: self.store,
            input,
            cfg,
            clock,
            state: SystemState::Idle,
            entry_pending: true,
            constant,
            calibration: None,
            purge_active: false,
            pump,
            shown_tenths: None,
            transitions: VecDeque::new(),
        })
    }
}
