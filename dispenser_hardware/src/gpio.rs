//! Raspberry Pi backend: step/dir stepper driver and the button interrupt source.
use std::time::{Duration, Instant};

use dispenser_traits::{BoxError, Level, Stepper};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

fn to_level(l: rppal::gpio::Level) -> Level {
    match l {
        rppal::gpio::Level::Low => Level::Low,
        rppal::gpio::Level::High => Level::High,
    }
}

/// STEP/DIR driver (A4988, DRV8825, TMC in legacy mode) pulsed from software.
///
/// Steps are emitted from `run_speed` whenever one step interval has elapsed,
/// so the caller's loop rate bounds the achievable speed.
pub struct HardwareStepper {
    step: OutputPin,
    dir: OutputPin,
    position: i64,
    target: i64,
    max_speed: f32,
    step_interval: Option<Duration>,
    last_step: Instant,
}

impl HardwareStepper {
    pub fn new(step_pin: u8, dir_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut step = gpio.get(step_pin).map_err(gpio_err)?.into_output();
        let dir = gpio.get(dir_pin).map_err(gpio_err)?.into_output();
        step.set_low();
        debug!(step_pin, dir_pin, "stepper pins open");
        Ok(Self {
            step,
            dir,
            position: 0,
            target: 0,
            max_speed: 0.0,
            step_interval: None,
            last_step: Instant::now(),
        })
    }

    fn pulse(&mut self, forward: bool) {
        if forward {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        self.step.set_high();
        // Drivers need ~1-2us of high time.
        let t = Instant::now();
        while t.elapsed() < Duration::from_micros(2) {
            std::hint::spin_loop();
        }
        self.step.set_low();
    }
}

impl Stepper for HardwareStepper {
    fn set_max_speed(&mut self, steps_per_sec: f32) -> std::result::Result<(), BoxError> {
        self.max_speed = steps_per_sec.abs();
        Ok(())
    }

    fn set_speed(&mut self, steps_per_sec: f32) -> std::result::Result<(), BoxError> {
        let sps = steps_per_sec.abs().min(self.max_speed);
        self.step_interval = if sps > 0.0 {
            Some(Duration::from_secs_f32(1.0 / sps))
        } else {
            None
        };
        Ok(())
    }

    fn move_relative(&mut self, steps: i64) -> std::result::Result<(), BoxError> {
        self.target = self.position.saturating_add(steps);
        Ok(())
    }

    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }

    fn run_speed(&mut self) -> std::result::Result<bool, BoxError> {
        let d = self.distance_to_go();
        let Some(interval) = self.step_interval else {
            return Ok(false);
        };
        if d == 0 {
            return Ok(false);
        }
        let now = Instant::now();
        if now.saturating_duration_since(self.last_step) < interval {
            return Ok(false);
        }
        self.pulse(d > 0);
        self.position += d.signum();
        self.last_step = now;
        trace!(position = self.position, "step");
        Ok(true)
    }

    fn stop(&mut self) -> std::result::Result<(), BoxError> {
        self.target = self.position;
        self.step.set_low();
        Ok(())
    }
}

/// Push button with pull-up, reporting every level change from rppal's
/// interrupt thread.
///
/// The callback runs outside the control loop and may fire at any time; it
/// must only record the edge and return.
pub struct ButtonInterrupt {
    pin: InputPin,
}

impl ButtonInterrupt {
    pub fn attach<F>(pin: u8, mut on_change: F) -> Result<Self>
    where
        F: FnMut(Level) + Send + 'static,
    {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut input = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        input
            .set_async_interrupt(Trigger::Both, move |level| on_change(to_level(level)))
            .map_err(gpio_err)?;
        debug!(pin, "button interrupt attached");
        Ok(Self { pin: input })
    }

    /// Current line level, read directly.
    pub fn level(&self) -> Level {
        to_level(self.pin.read())
    }
}

impl Drop for ButtonInterrupt {
    fn drop(&mut self) {
        if let Err(e) = self.pin.clear_async_interrupt() {
            tracing::warn!(error = %e, "failed to clear button interrupt");
        }
    }
}
