pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use dispenser_traits::{AnalogInput, BoxError, Display, Stepper};
use std::cell::Cell;
use std::rc::Rc;

pub use error::HwError;

/// Simulated stepper: every `run_speed` call takes one step while distance remains.
#[derive(Debug, Default)]
pub struct SimulatedStepper {
    position: i64,
    target: i64,
    max_speed: f32,
    speed: f32,
}

impl SimulatedStepper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute position in steps since construction.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}

impl Stepper for SimulatedStepper {
    fn set_max_speed(&mut self, steps_per_sec: f32) -> Result<(), BoxError> {
        self.max_speed = steps_per_sec.abs();
        Ok(())
    }
    fn set_speed(&mut self, steps_per_sec: f32) -> Result<(), BoxError> {
        self.speed = steps_per_sec.clamp(-self.max_speed, self.max_speed);
        Ok(())
    }
    fn move_relative(&mut self, steps: i64) -> Result<(), BoxError> {
        self.target = self.position.saturating_add(steps);
        tracing::trace!(steps, target = self.target, "sim stepper move");
        Ok(())
    }
    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }
    fn run_speed(&mut self) -> Result<bool, BoxError> {
        let d = self.distance_to_go();
        if d == 0 || self.speed == 0.0 {
            return Ok(false);
        }
        self.position += d.signum();
        Ok(true)
    }
    fn stop(&mut self) -> Result<(), BoxError> {
        self.target = self.position;
        Ok(())
    }
}

/// Glyph shown for the HD44780 full block in snapshots.
const BLOCK_CHAR: char = '#';

/// Simulated 16x2 character display backed by an in-memory grid.
#[derive(Debug)]
pub struct SimulatedDisplay {
    cells: [[char; 16]; 2],
    col: usize,
    row: usize,
    dirty: bool,
    clears: usize,
}

impl Default for SimulatedDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDisplay {
    pub fn new() -> Self {
        Self {
            cells: [[' '; 16]; 2],
            col: 0,
            row: 0,
            dirty: false,
            clears: 0,
        }
    }

    /// Text of one row; out-of-range rows read as empty.
    pub fn row(&self, r: usize) -> String {
        self.cells.get(r).map(|c| c.iter().collect()).unwrap_or_default()
    }

    /// Number of `clear()` calls so far.
    pub fn clear_count(&self) -> usize {
        self.clears
    }

    /// True if anything was written since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn put(&mut self, c: char) {
        // Writes past the last column are dropped, like the real module with
        // autoscroll off.
        if self.row < 2 && self.col < 16 {
            self.cells[self.row][self.col] = c;
        }
        self.col = self.col.saturating_add(1);
        self.dirty = true;
    }
}

impl Display for SimulatedDisplay {
    fn columns(&self) -> u8 {
        16
    }
    fn clear(&mut self) -> Result<(), BoxError> {
        self.cells = [[' '; 16]; 2];
        self.col = 0;
        self.row = 0;
        self.dirty = true;
        self.clears += 1;
        Ok(())
    }
    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), BoxError> {
        self.col = usize::from(col);
        self.row = usize::from(row);
        Ok(())
    }
    fn print(&mut self, text: &str) -> Result<(), BoxError> {
        for c in text.chars() {
            self.put(c);
        }
        Ok(())
    }
    fn write_glyph(&mut self, code: u8) -> Result<(), BoxError> {
        let c = if code == 0xFF { BLOCK_CHAR } else { char::from(code) };
        self.put(c);
        Ok(())
    }
}

/// Simulated potentiometer. Clone the handle from `handle()` to turn the knob
/// after the input has been moved into the controller.
#[derive(Debug, Clone)]
pub struct SimulatedAnalog {
    raw: Rc<Cell<u16>>,
    max: u16,
}

impl SimulatedAnalog {
    pub fn new(raw: u16, max: u16) -> Self {
        Self {
            raw: Rc::new(Cell::new(raw.min(max))),
            max,
        }
    }

    pub fn handle(&self) -> Rc<Cell<u16>> {
        self.raw.clone()
    }
}

impl AnalogInput for SimulatedAnalog {
    fn read(&mut self) -> Result<u16, BoxError> {
        Ok(self.raw.get().min(self.max))
    }
    fn max_raw(&self) -> u16 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn sim_stepper_walks_to_target() {
        let mut s = SimulatedStepper::new();
        s.set_max_speed(400.0).unwrap();
        s.set_speed(400.0).unwrap();
        s.move_relative(3).unwrap();
        let mut steps = 0;
        while s.run_speed().unwrap() {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(s.distance_to_go(), 0);
        assert_eq!(s.position(), 3);
    }

    #[test]
    fn sim_stepper_stop_drops_distance() {
        let mut s = SimulatedStepper::new();
        s.set_max_speed(100.0).unwrap();
        s.set_speed(100.0).unwrap();
        s.move_relative(-10).unwrap();
        s.run_speed().unwrap();
        s.stop().unwrap();
        assert_eq!(s.distance_to_go(), 0);
        assert_eq!(s.position(), -1);
    }

    #[test]
    fn sim_display_clips_and_tracks_dirty() {
        let mut d = SimulatedDisplay::new();
        d.set_cursor(12, 1).unwrap();
        d.print("overflow").unwrap();
        assert_eq!(d.row(1), "            over");
        assert!(d.take_dirty());
        assert!(!d.take_dirty());
        d.write_glyph(0xFF).unwrap();
        d.clear().unwrap();
        assert_eq!(d.clear_count(), 1);
        assert_eq!(d.row(1), " ".repeat(16));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(512, 512)]
    #[case(1023, 1023)]
    #[case(5000, 1023)]
    fn sim_analog_follows_handle(#[case] set: u16, #[case] expected: u16) {
        let mut a = SimulatedAnalog::new(0, 1023);
        a.handle().set(set);
        assert_eq!(a.read().unwrap(), expected);
    }
}
