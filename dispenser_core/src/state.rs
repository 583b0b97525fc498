//! Top-level modes and the transition graph between them.
//!
//! `next_state` is the whole graph; the controller never sets a state that it
//! did not get from here.
use std::fmt;
use std::time::Duration;

use crate::input::PressKind;

/// Machine modes. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Motor off, calibration shown
    Idle,
    /// Choose calibrate (short press) or purge (hold)
    CalibrationMenu,
    /// Sweep then volume prompt; no user exit
    Calibrating,
    /// Pump runs while the button is held
    Purging,
    /// Continuous dispensing
    Running,
    /// Reserved for cancellation handling; no transition leads here
    Canceled,
}

impl SystemState {
    pub const ALL: [SystemState; 6] = [
        SystemState::Idle,
        SystemState::CalibrationMenu,
        SystemState::Calibrating,
        SystemState::Purging,
        SystemState::Running,
        SystemState::Canceled,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemState::Idle => "Idle",
            SystemState::CalibrationMenu => "CalibrationMenu",
            SystemState::Calibrating => "Calibrating",
            SystemState::Purging => "Purging",
            SystemState::Running => "Running",
            SystemState::Canceled => "Canceled",
        }
    }

    /// States in which the motor may turn.
    pub fn motor_allowed(self) -> bool {
        matches!(
            self,
            SystemState::Calibrating | SystemState::Purging | SystemState::Running
        )
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to the transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Press { kind: PressKind, duration: Duration },
    /// The calibration constant was persisted.
    CalibrationStored,
    /// The button stayed released for the purge release window.
    PurgeReleased,
}

/// The transition graph. `None` means the trigger has no edge from `state`.
///
/// `menu_hold` is the calibration menu's cutoff, applied to the same measured
/// duration the global classification used.
pub fn next_state(state: SystemState, trigger: Trigger, menu_hold: Duration) -> Option<SystemState> {
    use PressKind::*;
    use SystemState::*;

    match (state, trigger) {
        (_, Trigger::Press { kind: Bounce, .. }) => None,

        (Idle, Trigger::Press { kind: Long, .. }) => Some(CalibrationMenu),
        (Idle, Trigger::Press { kind: Short, .. }) => Some(Running),

        (CalibrationMenu, Trigger::Press { duration, .. }) if duration >= menu_hold => Some(Purging),
        (CalibrationMenu, Trigger::Press { .. }) => Some(Calibrating),

        (Calibrating, Trigger::CalibrationStored) => Some(Idle),

        (Purging, Trigger::PurgeReleased) => Some(Idle),

        (Running, Trigger::Press { kind: Short, .. }) => Some(Idle),

        _ => None,
    }
}
