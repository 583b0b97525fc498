//! The state machine controller.
//!
//! `Controller::tick` is one pass of the main loop: drain classified presses,
//! apply transitions, run the entry action of a newly entered state, then give
//! the current state its non-blocking share of work. Nothing in a tick waits
//! on the button or the motor.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use dispenser_traits::{AnalogInput, CalibrationStore, Clock, Display, Stepper};
use dispenser_ui::screens;

use crate::calibration::{CalibrationConstant, CalibrationRun, derive_and_store};
use crate::config::ControllerCfg;
use crate::error::Result;
use crate::hw_error::HwResultExt;
use crate::input::{ButtonInput, PressEvent};
use crate::pump::Pump;
use crate::state::{SystemState, Trigger, next_state};

const TRANSITION_HISTORY: usize = 32;

/// One applied state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SystemState,
    pub to: SystemState,
    pub at: Instant,
}

/// Owns the system state and every collaborator it drives.
pub struct Controller<M, D, A, S> {
    pub(crate) motor: M,
    pub(crate) display: D,
    pub(crate) analog: A,
    pub(crate) store: S,
    pub(crate) input: ButtonInput,
    pub(crate) cfg: ControllerCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) state: SystemState,
    /// Entry action for `state` still owed.
    pub(crate) entry_pending: bool,
    pub(crate) constant: Option<CalibrationConstant>,
    pub(crate) calibration: Option<CalibrationRun>,
    pub(crate) purge_active: bool,
    pub(crate) pump: Pump,
    pub(crate) shown_tenths: Option<Option<u32>>,
    pub(crate) transitions: VecDeque<Transition>,
}

impl<M, D, A, S> core::fmt::Debug for Controller<M, D, A, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("constant", &self.constant)
            .field("purge_active", &self.purge_active)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl<M, D, A, S> Controller<M, D, A, S>
where
    M: Stepper,
    D: Display,
    A: AnalogInput,
    S: CalibrationStore,
{
    /// One main-loop pass. Returns the state after the pass.
    pub fn tick(&mut self) -> Result<SystemState> {
        let now = self.clock.now();
        self.run_entry_action()?;
        while let Some(ev) = self.input.poll() {
            self.handle_press(ev, now)?;
            self.run_entry_action()?;
        }
        self.step_state(now)?;
        self.run_entry_action()?;
        Ok(self.state)
    }

    /// Stop the motor regardless of state. Used on shutdown and after errors.
    pub fn halt_motor(&mut self) -> Result<()> {
        self.pump.halt(&mut self.motor)?;
        self.motor.stop().hw("stopping motor")
    }

    fn handle_press(&mut self, ev: PressEvent, now: Instant) -> Result<()> {
        match self.state {
            SystemState::Calibrating => self.confirm_volume(ev, now),
            SystemState::Purging => {
                if !self.purge_active {
                    self.activate_purge()?;
                }
                Ok(())
            }
            state => {
                let trigger = Trigger::Press {
                    kind: ev.kind,
                    duration: ev.duration,
                };
                match next_state(state, trigger, self.cfg.button.menu_hold) {
                    Some(to) => self.transition(to, now),
                    None => {
                        tracing::warn!(
                            state = %state,
                            kind = ?ev.kind,
                            ms = ev.duration.as_millis() as u64,
                            "press has no transition in this state; ignored"
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    fn confirm_volume(&mut self, ev: PressEvent, now: Instant) -> Result<()> {
        let Some(run) = self.calibration.as_mut() else {
            return Ok(());
        };
        if run.is_sweeping() {
            tracing::debug!(kind = ?ev.kind, "press during calibration sweep; ignored");
            return Ok(());
        }
        let total = run.params().total_revolutions;
        let Some(volume) = run.latch(&ev, &mut self.analog, &mut self.display)? else {
            return Ok(());
        };
        let constant = derive_and_store(&mut self.store, total, volume)?;
        self.constant = Some(constant);
        self.calibration = None;
        self.apply(Trigger::CalibrationStored, now)
    }

    fn activate_purge(&mut self) -> Result<()> {
        self.purge_active = true;
        screens::purge_active(&mut self.display).hw("drawing purge screen")?;
        tracing::info!("purge active");
        Ok(())
    }

    fn step_state(&mut self, now: Instant) -> Result<()> {
        match self.state {
            SystemState::Idle | SystemState::CalibrationMenu | SystemState::Canceled => Ok(()),
            SystemState::Calibrating => self.step_calibration(now),
            SystemState::Purging => self.step_purge(now),
            SystemState::Running => self.step_running(),
        }
    }

    fn step_calibration(&mut self, now: Instant) -> Result<()> {
        let Some(run) = self.calibration.as_mut() else {
            return Ok(());
        };
        if run.is_sweeping() {
            run.advance_sweep(&mut self.motor, &mut self.display, self.cfg.motor_burst, now)?;
        } else {
            run.sample_volume(&mut self.analog, &mut self.display)?;
        }
        Ok(())
    }

    fn step_purge(&mut self, now: Instant) -> Result<()> {
        let debounce = self.input.thresholds().debounce;
        if let Some(since) = self.input.pressed_since() {
            if now.saturating_duration_since(since) < debounce {
                return Ok(());
            }
            if !self.purge_active {
                self.activate_purge()?;
            }
            self.pump.start(&mut self.motor, self.cfg.purge.speed_sps)?;
            self.pump.run(&mut self.motor, self.cfg.motor_burst)?;
            return Ok(());
        }

        self.pump.halt(&mut self.motor)?;
        if !self.purge_active {
            return Ok(());
        }
        let released_for = self
            .input
            .last_release()
            .map(|t| now.saturating_duration_since(t));
        if released_for.is_some_and(|d| d >= self.cfg.purge.release) {
            self.apply(Trigger::PurgeReleased, now)?;
        }
        Ok(())
    }

    fn step_running(&mut self) -> Result<()> {
        self.pump.run(&mut self.motor, self.cfg.motor_burst)?;
        let tenths = self.dispensed_tenths();
        if self.shown_tenths != Some(tenths) {
            screens::dispensed(&mut self.display, tenths).hw("drawing dispensed volume")?;
            self.shown_tenths = Some(tenths);
        }
        Ok(())
    }

    fn dispensed_tenths(&self) -> Option<u32> {
        let spr = self.cfg.calibration.steps_per_revolution.max(1);
        self.constant.map(|c| {
            let revolutions = self.pump.steps() as f32 / spr as f32;
            (c.ml_for_revolutions(revolutions) * 10.0) as u32
        })
    }

    fn apply(&mut self, trigger: Trigger, now: Instant) -> Result<()> {
        match next_state(self.state, trigger, self.cfg.button.menu_hold) {
            Some(to) => self.transition(to, now),
            None => {
                tracing::warn!(state = %self.state, ?trigger, "trigger has no transition; ignored");
                Ok(())
            }
        }
    }

    fn transition(&mut self, to: SystemState, now: Instant) -> Result<()> {
        let from = self.state;
        if from.motor_allowed() {
            self.halt_motor()?;
        }
        if from == SystemState::Calibrating {
            self.calibration = None;
        }
        self.state = to;
        self.entry_pending = true;
        if self.transitions.len() == TRANSITION_HISTORY {
            self.transitions.pop_front();
        }
        self.transitions.push_back(Transition { from, to, at: now });
        tracing::info!(from = %from, to = %to, "state transition");
        Ok(())
    }

    fn run_entry_action(&mut self) -> Result<()> {
        if !self.entry_pending {
            return Ok(());
        }
        self.entry_pending = false;
        match self.state {
            SystemState::Idle => {
                self.display.clear().hw("clearing display")?;
                let rpm = self.constant.map(CalibrationConstant::revolutions_per_ml);
                screens::idle(&mut self.display, rpm).hw("drawing idle screen")
            }
            SystemState::CalibrationMenu => {
                self.display.clear().hw("clearing display")?;
                screens::calibration_menu(&mut self.display).hw("drawing calibration menu")
            }
            SystemState::Calibrating => {
                self.display.clear().hw("clearing display")?;
                let run = CalibrationRun::start(
                    self.cfg.calibration.clone(),
                    &mut self.motor,
                    &mut self.display,
                )?;
                self.calibration = Some(run);
                Ok(())
            }
            SystemState::Purging => {
                self.purge_active = false;
                self.display.clear().hw("clearing display")?;
                screens::purge_prompt(&mut self.display).hw("drawing purge prompt")
            }
            SystemState::Running => {
                self.display.clear().hw("clearing display")?;
                screens::running(&mut self.display).hw("drawing run screen")?;
                self.shown_tenths = None;
                self.pump.reset_count();
                self.pump.start(&mut self.motor, self.cfg.dispense.speed_sps)
            }
            SystemState::Canceled => {
                tracing::warn!("entered reserved Canceled state; no action taken");
                Ok(())
            }
        }
    }
}

impl<M, D, A, S> Controller<M, D, A, S> {
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// The constant currently in effect, if any.
    pub fn calibration(&self) -> Option<CalibrationConstant> {
        self.constant
    }

    pub fn is_purge_active(&self) -> bool {
        self.purge_active
    }

    /// Most recent transitions, oldest first.
    pub fn recent_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    pub fn config(&self) -> &ControllerCfg {
        &self.cfg
    }

    pub fn input(&self) -> &ButtonInput {
        &self.input
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Dispensed volume in tenths of a milliliter while running.
    pub fn dispensed_tenths_ml(&self) -> Option<u32> {
        if self.state != SystemState::Running {
            return None;
        }
        self.shown_tenths.flatten()
    }
}
