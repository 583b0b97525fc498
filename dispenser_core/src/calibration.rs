//! Calibration engine: fixed-revolution sweep, measured-volume query, and the
//! derived revolutions-per-milliliter constant.
//!
//! A run moves through two cooperative phases driven by the controller tick:
//! the motor sweep, then the volume prompt. The constant is written to the
//! store only once the user confirms a reading, and that write is the last
//! thing a run does. Anything that stops a run earlier leaves the stored
//! constant untouched.
use std::num::NonZeroU8;
use std::time::Instant;

use dispenser_traits::{AnalogInput, CalibrationStore, Display, Stepper};
use dispenser_ui::{filled_blocks, screens};

use crate::error::{DispenserError, Result};
use crate::hw_error::HwResultExt;
use crate::input::PressEvent;

pub const MIN_VOLUME_ML: u8 = 1;
pub const MAX_VOLUME_ML: u8 = 20;

/// User-entered volume, always within `MIN_VOLUME_ML..=MAX_VOLUME_ML`.
/// Zero is unrepresentable, so deriving the constant cannot divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasuredVolume(NonZeroU8);

impl MeasuredVolume {
    pub fn new(ml: u8) -> Option<Self> {
        if (MIN_VOLUME_ML..=MAX_VOLUME_ML).contains(&ml) {
            NonZeroU8::new(ml).map(Self)
        } else {
            None
        }
    }

    /// Map a raw ADC reading linearly onto the volume range, truncating like
    /// Arduino's `map(raw, 0, raw_max, 1, 20)`. Out-of-range readings clamp.
    pub fn from_raw(raw: u16, raw_max: u16) -> Self {
        let max = u32::from(raw_max.max(1));
        let raw = u32::from(raw).min(max);
        let span = u32::from(MAX_VOLUME_ML - MIN_VOLUME_ML);
        let ml = raw * span / max + u32::from(MIN_VOLUME_ML);
        Self(NonZeroU8::new(ml as u8).unwrap_or(NonZeroU8::MIN))
    }

    pub fn ml(self) -> u8 {
        self.0.get()
    }
}

/// Pump revolutions per milliliter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConstant {
    revolutions_per_ml: f32,
}

impl CalibrationConstant {
    pub fn derive(total_revolutions: u32, measured: MeasuredVolume) -> Self {
        Self {
            revolutions_per_ml: total_revolutions as f32 / f32::from(measured.ml()),
        }
    }

    /// Accept a value read back from storage; rejects non-finite or non-positive values.
    pub fn from_stored(v: f32) -> Option<Self> {
        (v.is_finite() && v > 0.0).then_some(Self {
            revolutions_per_ml: v,
        })
    }

    pub fn revolutions_per_ml(self) -> f32 {
        self.revolutions_per_ml
    }

    pub fn ml_for_revolutions(self, revolutions: f32) -> f32 {
        revolutions / self.revolutions_per_ml
    }
}

/// Derive the constant and overwrite the store slot with it.
pub fn derive_and_store<S: CalibrationStore + ?Sized>(
    store: &mut S,
    total_revolutions: u32,
    measured: MeasuredVolume,
) -> Result<CalibrationConstant> {
    let c = CalibrationConstant::derive(total_revolutions, measured);
    store
        .store(c.revolutions_per_ml())
        .map_err(|e| eyre::Report::new(DispenserError::Store(e.to_string())))?;
    tracing::info!(
        total_revolutions,
        measured_ml = measured.ml(),
        revolutions_per_ml = c.revolutions_per_ml(),
        "calibration stored"
    );
    Ok(c)
}

/// Read the stored constant. An unusable stored value is reported and treated as absent.
pub fn load_constant<S: CalibrationStore + ?Sized>(store: &S) -> Result<Option<CalibrationConstant>> {
    let raw = store
        .load()
        .map_err(|e| eyre::Report::new(DispenserError::Store(e.to_string())))?;
    Ok(raw.and_then(|v| {
        let c = CalibrationConstant::from_stored(v);
        if c.is_none() {
            tracing::warn!(value = v, "ignoring invalid stored calibration");
        }
        c
    }))
}

/// Fixed parameters of one calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParams {
    pub total_revolutions: u32,
    pub steps_per_revolution: u32,
    pub sweep_speed_sps: f32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            total_revolutions: 10,
            steps_per_revolution: 400,
            sweep_speed_sps: 400.0,
        }
    }
}

impl CalibrationParams {
    pub fn total_steps(&self) -> i64 {
        i64::from(self.total_revolutions) * i64::from(self.steps_per_revolution)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sweep,
    Measure {
        prompt_at: Instant,
        shown: Option<MeasuredVolume>,
    },
}

/// One calibration episode in progress.
#[derive(Debug)]
pub struct CalibrationRun {
    params: CalibrationParams,
    phase: Phase,
    bar_blocks: u8,
}

impl CalibrationRun {
    /// Queue the sweep on the motor and put up the calibration screen.
    pub fn start<M, D>(params: CalibrationParams, motor: &mut M, display: &mut D) -> Result<Self>
    where
        M: Stepper + ?Sized,
        D: Display + ?Sized,
    {
        motor.set_max_speed(params.sweep_speed_sps).hw("configuring sweep speed")?;
        motor.set_speed(params.sweep_speed_sps).hw("configuring sweep speed")?;
        motor.move_relative(params.total_steps()).hw("queueing sweep")?;
        screens::calibration_sweep(display).hw("drawing calibration screen")?;
        tracing::info!(
            revolutions = params.total_revolutions,
            steps = params.total_steps(),
            "calibration sweep started"
        );
        Ok(Self {
            params,
            phase: Phase::Sweep,
            bar_blocks: 0,
        })
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    pub fn is_sweeping(&self) -> bool {
        self.phase == Phase::Sweep
    }

    /// Give the motor up to `burst` advance calls, refresh the progress bar,
    /// and switch to the volume prompt once no distance remains.
    /// Returns true when the sweep has finished.
    pub fn advance_sweep<M, D>(
        &mut self,
        motor: &mut M,
        display: &mut D,
        burst: u32,
        now: Instant,
    ) -> Result<bool>
    where
        M: Stepper + ?Sized,
        D: Display + ?Sized,
    {
        if !self.is_sweeping() {
            return Ok(true);
        }
        for _ in 0..burst {
            if motor.distance_to_go() == 0 {
                break;
            }
            motor.run_speed().hw("advancing sweep")?;
        }

        let total = self.params.total_steps().max(1).unsigned_abs();
        let remaining = motor.distance_to_go().unsigned_abs().min(total);
        let percent = ((total - remaining) * 100 / total) as u8;
        let blocks = filled_blocks(percent, display.columns());
        if blocks != self.bar_blocks {
            screens::sweep_progress(display, percent).hw("drawing sweep progress")?;
            self.bar_blocks = blocks;
        }

        if remaining > 0 {
            return Ok(false);
        }
        screens::volume_prompt(display).hw("drawing volume prompt")?;
        self.phase = Phase::Measure {
            prompt_at: now,
            shown: None,
        };
        tracing::info!("sweep complete; waiting for measured volume (no timeout)");
        Ok(true)
    }

    /// Take one reading of the volume knob and redraw it if it changed.
    pub fn sample_volume<A, D>(&mut self, analog: &mut A, display: &mut D) -> Result<Option<MeasuredVolume>>
    where
        A: AnalogInput + ?Sized,
        D: Display + ?Sized,
    {
        let Phase::Measure { shown, .. } = &mut self.phase else {
            return Ok(None);
        };
        let raw = analog.read().hw("reading volume knob")?;
        let v = MeasuredVolume::from_raw(raw, analog.max_raw());
        if *shown != Some(v) {
            screens::volume_reading(display, v.ml()).hw("drawing volume")?;
            tracing::trace!(raw, ml = v.ml(), "volume reading");
            *shown = Some(v);
        }
        Ok(Some(v))
    }

    /// Latch the displayed volume if `press` confirms it. Only presses that
    /// began after the prompt appeared count.
    pub fn latch<A, D>(
        &mut self,
        press: &PressEvent,
        analog: &mut A,
        display: &mut D,
    ) -> Result<Option<MeasuredVolume>>
    where
        A: AnalogInput + ?Sized,
        D: Display + ?Sized,
    {
        let (prompt_at, shown) = match self.phase {
            Phase::Sweep => return Ok(None),
            Phase::Measure { prompt_at, shown } => (prompt_at, shown),
        };
        if press.start < prompt_at {
            tracing::debug!("press began before the volume prompt; ignored");
            return Ok(None);
        }
        match shown {
            Some(v) => Ok(Some(v)),
            None => self.sample_volume(analog, display),
        }
    }
}
