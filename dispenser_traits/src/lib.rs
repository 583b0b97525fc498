//! Collaborator boundaries for the dispenser controller.
//!
//! The core never talks to pins, buses or files directly. Everything physical
//! goes through these traits so the same controller runs against the
//! simulated backend, a Raspberry Pi, or test doubles.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type returned across every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Electrical level observed on a digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Stepper driver with AccelStepper-style relative moves.
///
/// `move_relative` queues a target; nothing moves until `run_speed` is called,
/// and it must be called at high frequency while `distance_to_go() != 0`.
pub trait Stepper {
    fn set_max_speed(&mut self, steps_per_sec: f32) -> Result<(), BoxError>;
    fn set_speed(&mut self, steps_per_sec: f32) -> Result<(), BoxError>;
    fn move_relative(&mut self, steps: i64) -> Result<(), BoxError>;
    fn distance_to_go(&self) -> i64;
    /// Advance at most one step toward the target. Returns true if a step was taken.
    fn run_speed(&mut self) -> Result<bool, BoxError>;
    /// Drop any outstanding distance.
    fn stop(&mut self) -> Result<(), BoxError>;
}

/// Character display addressed by column and row.
pub trait Display {
    /// Number of character columns per row.
    fn columns(&self) -> u8;
    fn clear(&mut self) -> Result<(), BoxError>;
    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), BoxError>;
    fn print(&mut self, text: &str) -> Result<(), BoxError>;
    /// Write a raw glyph code at the cursor (e.g. 0xFF, the full block on HD44780 ROMs).
    fn write_glyph(&mut self, code: u8) -> Result<(), BoxError>;
}

/// Single analog channel.
pub trait AnalogInput {
    /// Raw conversion result in `0..=max_raw()`.
    fn read(&mut self) -> Result<u16, BoxError>;
    fn max_raw(&self) -> u16;
}

/// Single-slot persistent storage for the revolutions-per-milliliter constant.
pub trait CalibrationStore {
    fn load(&self) -> Result<Option<f32>, BoxError>;
    fn store(&mut self, revolutions_per_ml: f32) -> Result<(), BoxError>;
}

impl<T: Stepper + ?Sized> Stepper for Box<T> {
    fn set_max_speed(&mut self, steps_per_sec: f32) -> Result<(), BoxError> {
        (**self).set_max_speed(steps_per_sec)
    }
    fn set_speed(&mut self, steps_per_sec: f32) -> Result<(), BoxError> {
        (**self).set_speed(steps_per_sec)
    }
    fn move_relative(&mut self, steps: i64) -> Result<(), BoxError> {
        (**self).move_relative(steps)
    }
    fn distance_to_go(&self) -> i64 {
        (**self).distance_to_go()
    }
    fn run_speed(&mut self) -> Result<bool, BoxError> {
        (**self).run_speed()
    }
    fn stop(&mut self) -> Result<(), BoxError> {
        (**self).stop()
    }
}
