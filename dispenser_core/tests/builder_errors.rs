use std::sync::Arc;
use std::time::Duration;

use dispenser_core::error::BuildError;
use dispenser_core::{Controller, ControllerCfg, MemoryStore, Thresholds, edge_channel};
use dispenser_hardware::{SimulatedAnalog, SimulatedDisplay, SimulatedStepper};
use dispenser_traits::MonotonicClock;
use rstest::rstest;

fn try_build(cfg: ControllerCfg, input_thresholds: Thresholds, store: MemoryStore) -> dispenser_core::Result<()> {
    let (_tx, input) = edge_channel(input_thresholds, true, Arc::new(MonotonicClock::new()));
    Controller::builder()
        .with_motor(SimulatedStepper::new())
        .with_display(SimulatedDisplay::new())
        .with_analog(SimulatedAnalog::new(0, 1023))
        .with_store(store)
        .with_input(input)
        .with_config(cfg)
        .build()
        .map(|_| ())
}

#[rstest]
fn missing_input_yields_typed_build_error() {
    let err = Controller::builder()
        .with_motor(SimulatedStepper::new())
        .with_display(SimulatedDisplay::new())
        .with_analog(SimulatedAnalog::new(0, 1023))
        .with_store(MemoryStore::new())
        .build()
        .expect_err("should fail with MissingInput");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingInput) => {}
        other => panic!("expected MissingInput, got: {other:?}"),
    }
}

#[rstest]
fn mismatched_input_thresholds_rejected() {
    let other = Thresholds {
        debounce: Duration::from_millis(10),
        ..Thresholds::default()
    };
    let err = try_build(ControllerCfg::default(), other, MemoryStore::new()).unwrap_err();
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::InvalidConfig(_))));
}

#[rstest]
#[case::zero_burst({ let mut c = ControllerCfg::default(); c.motor_burst = 0; c })]
#[case::zero_revolutions({ let mut c = ControllerCfg::default(); c.calibration.total_revolutions = 0; c })]
#[case::nan_speed({ let mut c = ControllerCfg::default(); c.dispense.speed_sps = f32::NAN; c })]
#[case::zero_release({ let mut c = ControllerCfg::default(); c.purge.release = Duration::ZERO; c })]
#[case::menu_hold_equals_debounce({ let mut c = ControllerCfg::default(); c.button.menu_hold = c.button.thresholds.debounce; c })]
fn invalid_config_rejected(#[case] cfg: ControllerCfg) {
    let t = cfg.button.thresholds;
    let err = try_build(cfg, t, MemoryStore::new()).unwrap_err();
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::InvalidConfig(_))));
}

#[rstest]
fn invalid_stored_value_treated_as_absent() {
    let (_tx, input) = edge_channel(Thresholds::default(), true, Arc::new(MonotonicClock::new()));
    let ctl = Controller::builder()
        .with_motor(SimulatedStepper::new())
        .with_display(SimulatedDisplay::new())
        .with_analog(SimulatedAnalog::new(0, 1023))
        .with_store(MemoryStore::with_value(-1.0))
        .with_input(input)
        .build()
        .unwrap();
    assert!(ctl.calibration().is_none());
}
