use std::time::Duration;

use dispenser_core::{PressKind, SystemState, Trigger, next_state};
use proptest::prelude::*;
use rstest::rstest;

const HOLD: Duration = Duration::from_millis(2000);

fn press(kind: PressKind, ms: u64) -> Trigger {
    Trigger::Press {
        kind,
        duration: Duration::from_millis(ms),
    }
}

#[rstest]
#[case(SystemState::Idle, press(PressKind::Short, 200), Some(SystemState::Running))]
#[case(SystemState::Idle, press(PressKind::Long, 6000), Some(SystemState::CalibrationMenu))]
#[case(SystemState::Running, press(PressKind::Short, 200), Some(SystemState::Idle))]
#[case(SystemState::Running, press(PressKind::Long, 6000), None)]
#[case(SystemState::Calibrating, press(PressKind::Short, 200), None)]
#[case(SystemState::Calibrating, Trigger::CalibrationStored, Some(SystemState::Idle))]
#[case(SystemState::Purging, press(PressKind::Short, 200), None)]
#[case(SystemState::Purging, Trigger::PurgeReleased, Some(SystemState::Idle))]
#[case(SystemState::Idle, Trigger::PurgeReleased, None)]
#[case(SystemState::Canceled, press(PressKind::Short, 200), None)]
#[case(SystemState::Canceled, press(PressKind::Long, 6000), None)]
fn transition_table(#[case] from: SystemState, #[case] trigger: Trigger, #[case] to: Option<SystemState>) {
    assert_eq!(next_state(from, trigger, HOLD), to);
}

fn any_trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        (0u64..10_000).prop_map(|ms| {
            let kind = if ms < 50 {
                PressKind::Bounce
            } else if ms >= 5000 {
                PressKind::Long
            } else {
                PressKind::Short
            };
            press(kind, ms)
        }),
        Just(Trigger::CalibrationStored),
        Just(Trigger::PurgeReleased),
    ]
}

proptest! {
    #[test]
    fn canceled_is_never_entered(triggers in prop::collection::vec(any_trigger(), 1..64)) {
        let mut state = SystemState::Idle;
        for t in triggers {
            if let Some(next) = next_state(state, t, HOLD) {
                prop_assert_ne!(next, SystemState::Canceled);
                state = next;
            }
        }
    }

    #[test]
    fn running_only_from_idle_short(t in any_trigger()) {
        for s in SystemState::ALL {
            if next_state(s, t, HOLD) == Some(SystemState::Running) {
                prop_assert_eq!(s, SystemState::Idle);
                let short = matches!(t, Trigger::Press { kind: PressKind::Short, .. });
                prop_assert!(short, "running entered from {:?}", t);
            }
        }
    }
}
