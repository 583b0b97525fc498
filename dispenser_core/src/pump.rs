//! Continuous pump drive for dispensing and purging.
use dispenser_traits::Stepper;

use crate::error::Result;
use crate::hw_error::HwResultExt;

/// Keeps the stepper turning by topping up its relative target one chunk at a
/// time, and counts the steps actually taken.
#[derive(Debug)]
pub(crate) struct Pump {
    chunk_steps: i64,
    running: bool,
    steps: u64,
}

impl Pump {
    pub(crate) fn new(chunk_steps: u32) -> Self {
        Self {
            chunk_steps: i64::from(chunk_steps.max(1)),
            running: false,
            steps: 0,
        }
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn reset_count(&mut self) {
        self.steps = 0;
    }

    pub(crate) fn start<M: Stepper + ?Sized>(&mut self, motor: &mut M, speed_sps: f32) -> Result<()> {
        if self.running {
            return Ok(());
        }
        motor.set_max_speed(speed_sps).hw("configuring pump speed")?;
        motor.set_speed(speed_sps).hw("configuring pump speed")?;
        self.running = true;
        tracing::debug!(speed_sps, "pump on");
        Ok(())
    }

    /// Up to `burst` advance calls. Returns the number of steps taken.
    pub(crate) fn run<M: Stepper + ?Sized>(&mut self, motor: &mut M, burst: u32) -> Result<u32> {
        if !self.running {
            return Ok(0);
        }
        let mut taken = 0;
        for _ in 0..burst {
            if motor.distance_to_go() == 0 {
                motor.move_relative(self.chunk_steps).hw("queueing pump steps")?;
            }
            if motor.run_speed().hw("advancing pump")? {
                taken += 1;
            }
        }
        self.steps = self.steps.saturating_add(u64::from(taken));
        Ok(taken)
    }

    pub(crate) fn halt<M: Stepper + ?Sized>(&mut self, motor: &mut M) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        motor.stop().hw("stopping pump")?;
        self.running = false;
        tracing::debug!(steps = self.steps, "pump off");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_hardware::SimulatedStepper;

    #[test]
    fn runs_past_chunk_boundaries_until_halted() {
        let mut m = SimulatedStepper::new();
        let mut p = Pump::new(10);
        assert_eq!(p.run(&mut m, 5).unwrap(), 0);
        p.start(&mut m, 400.0).unwrap();
        assert_eq!(p.run(&mut m, 25).unwrap(), 25);
        assert_eq!(m.position(), 25);
        p.halt(&mut m).unwrap();
        assert_eq!(m.distance_to_go(), 0);
        assert_eq!(p.run(&mut m, 5).unwrap(), 0);
        assert_eq!(p.steps(), 25);
    }
}
