use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use dispenser_core::input::EDGE_QUEUE_DEPTH;
use dispenser_core::{Controller, ControllerCfg, EdgeSender, MemoryStore, SystemState, edge_channel};
use dispenser_hardware::{SimulatedAnalog, SimulatedDisplay, SimulatedStepper};
use dispenser_traits::clock::test_clock::TestClock;
use dispenser_traits::{CalibrationStore, Clock, Level, Stepper};
use rstest::rstest;

type SimController = Controller<SimulatedStepper, SimulatedDisplay, SimulatedAnalog, MemoryStore>;

/// Controller on simulated hardware with a hand-driven clock.
struct Rig {
    clock: TestClock,
    edges: EdgeSender,
    knob: Rc<Cell<u16>>,
    ctl: SimController,
}

fn rig(store: MemoryStore) -> Rig {
    let clock = TestClock::new();
    let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
    let cfg = ControllerCfg::default();
    let (edges, input) = edge_channel(cfg.button.thresholds, cfg.button.active_low, shared.clone());
    let analog = SimulatedAnalog::new(0, 1023);
    let knob = analog.handle();
    let ctl = Controller::builder()
        .with_motor(SimulatedStepper::new())
        .with_display(SimulatedDisplay::new())
        .with_analog(analog)
        .with_store(store)
        .with_input(input)
        .with_config(cfg)
        .with_clock(shared)
        .build()
        .unwrap();
    let mut r = Rig {
        clock,
        edges,
        knob,
        ctl,
    };
    r.tick();
    r
}

impl Rig {
    fn tick(&mut self) -> SystemState {
        self.ctl.tick().unwrap()
    }

    fn down(&mut self) {
        self.edges.on_level_change(Level::Low);
    }

    fn up(&mut self) {
        self.edges.on_level_change(Level::High);
    }

    /// Advance time in 10ms slices, ticking after each.
    fn wait_ms(&mut self, ms: u64) {
        let mut left = ms;
        while left > 0 {
            let step = left.min(10);
            self.clock.advance_ms(step);
            left -= step;
            self.tick();
        }
    }

    /// Press for `ms`, ticking while held, then release and tick once.
    fn hold(&mut self, ms: u64) -> SystemState {
        self.down();
        self.tick();
        self.wait_ms(ms);
        self.up();
        self.tick()
    }

    fn row(&self, r: usize) -> String {
        self.ctl.display().row(r).trim().to_string()
    }

    fn finish_sweep(&mut self) {
        for _ in 0..1000 {
            if self.row(0) == "Set liquid vol." {
                return;
            }
            self.tick();
        }
        panic!("sweep never finished");
    }
}

#[rstest]
fn boots_idle_and_shows_missing_calibration() {
    let r = rig(MemoryStore::new());
    assert_eq!(r.ctl.state(), SystemState::Idle);
    assert_eq!(r.row(0), "Idle");
    assert_eq!(r.row(1), "Cal: none");
}

#[rstest]
fn boots_with_stored_constant() {
    let r = rig(MemoryStore::with_value(2.0));
    assert_eq!(r.row(1), "Cal: 2.00");
    assert_eq!(r.ctl.calibration().map(|c| c.revolutions_per_ml()), Some(2.0));
}

#[rstest]
fn short_press_toggles_running() {
    let mut r = rig(MemoryStore::new());
    assert_eq!(r.hold(200), SystemState::Running);
    r.wait_ms(100);
    assert!(r.ctl.motor().position() > 0);
    assert_eq!(r.hold(200), SystemState::Idle);
    let parked = r.ctl.motor().position();
    r.wait_ms(100);
    assert_eq!(r.ctl.motor().position(), parked);
    assert_eq!(r.ctl.motor().distance_to_go(), 0);
}

#[rstest]
#[case::bounce(20, SystemState::Idle)]
#[case::short(200, SystemState::Running)]
#[case::gap(3000, SystemState::Running)]
#[case::long(5000, SystemState::CalibrationMenu)]
fn idle_press_classification(#[case] ms: u64, #[case] expected: SystemState) {
    let mut r = rig(MemoryStore::new());
    assert_eq!(r.hold(ms), expected);
}

#[rstest]
fn six_second_press_never_passes_through_running() {
    let mut r = rig(MemoryStore::new());
    r.down();
    for _ in 0..60 {
        r.clock.advance_ms(100);
        assert_eq!(r.tick(), SystemState::Idle);
    }
    r.up();
    assert_eq!(r.tick(), SystemState::CalibrationMenu);
    let seen: Vec<_> = r.ctl.recent_transitions().map(|t| (t.from, t.to)).collect();
    assert_eq!(seen, vec![(SystemState::Idle, SystemState::CalibrationMenu)]);
    assert_eq!(r.ctl.motor().position(), 0);
}

#[rstest]
#[case::just_below_hold(1999, SystemState::Calibrating)]
#[case::at_hold(2000, SystemState::Purging)]
#[case::long(6000, SystemState::Purging)]
fn menu_selection_by_hold_time(#[case] ms: u64, #[case] expected: SystemState) {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    assert_eq!(r.hold(ms), expected);
}

#[rstest]
fn entry_action_draws_once_per_transition() {
    let mut r = rig(MemoryStore::new());
    let clears = r.ctl.display().clear_count();
    assert_eq!(clears, 1);
    r.wait_ms(500);
    assert_eq!(r.ctl.display().clear_count(), clears);
    r.hold(5000);
    assert_eq!(r.ctl.display().clear_count(), clears + 1);
    r.wait_ms(500);
    assert_eq!(r.ctl.display().clear_count(), clears + 1);
}

#[rstest]
fn calibration_stores_revolutions_per_ml() {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    assert_eq!(r.hold(200), SystemState::Calibrating);
    assert_eq!(r.row(0), "CALIBRATION");

    // Presses during the sweep are ignored.
    assert_eq!(r.hold(200), SystemState::Calibrating);
    r.finish_sweep();
    let params = r.ctl.config().calibration.clone();
    assert_eq!(r.ctl.motor().position(), params.total_steps());

    // 216/1023 maps to 5 ml.
    r.knob.set(216);
    r.tick();
    assert_eq!(r.row(1), "5 ml");

    assert_eq!(r.hold(200), SystemState::Idle);
    assert_eq!(r.ctl.store().load().unwrap(), Some(2.0));
    assert_eq!(r.ctl.store().writes(), 1);
    assert_eq!(r.row(1), "Cal: 2.00");
}

#[rstest]
fn press_held_across_prompt_does_not_confirm() {
    let mut r = rig(MemoryStore::with_value(1.5));
    r.hold(5000);
    r.hold(200);
    r.down();
    r.clock.advance_ms(10);
    r.finish_sweep();
    r.clock.advance_ms(300);
    r.up();
    assert_eq!(r.tick(), SystemState::Calibrating);
    assert_eq!(r.ctl.store().writes(), 0);
    assert_eq!(r.ctl.store().load().unwrap(), Some(1.5));
}

#[rstest]
fn volume_prompt_tracks_knob() {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    r.hold(200);
    r.finish_sweep();
    r.tick();
    assert_eq!(r.row(1), "1 ml");
    r.knob.set(1023);
    r.tick();
    assert_eq!(r.row(1), "20 ml");
}

#[rstest]
fn purge_runs_only_while_held() {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    assert_eq!(r.hold(2500), SystemState::Purging);
    assert_eq!(r.row(0), "Hold purge");
    assert!(!r.ctl.is_purge_active());

    // Waiting without a fresh press never leaves purge.
    r.wait_ms(5000);
    assert_eq!(r.ctl.state(), SystemState::Purging);
    assert_eq!(r.ctl.motor().position(), 0);

    r.down();
    r.wait_ms(200);
    assert!(r.ctl.is_purge_active());
    assert_eq!(r.row(0), "Purging..");
    let moved = r.ctl.motor().position();
    assert!(moved > 0);

    r.up();
    r.tick();
    r.wait_ms(500);
    assert_eq!(r.ctl.motor().position(), moved);
}

#[rstest]
fn purge_release_window_resets_on_repress() {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    r.hold(2500);
    r.hold(300);
    assert!(r.ctl.is_purge_active());

    r.clock.advance_ms(1999);
    assert_eq!(r.tick(), SystemState::Purging);

    r.hold(100);
    r.clock.advance_ms(1999);
    assert_eq!(r.tick(), SystemState::Purging);
    r.clock.advance_ms(1);
    assert_eq!(r.tick(), SystemState::Idle);
    assert_eq!(r.row(0), "Idle");
}

#[rstest]
fn running_shows_dispensed_volume() {
    let mut r = rig(MemoryStore::with_value(2.0));
    r.hold(200);
    for _ in 0..9 {
        r.tick();
    }
    // 640 steps / 400 per rev / 2 rev per ml
    assert_eq!(r.ctl.dispensed_tenths_ml(), Some(8));
    assert_eq!(r.row(1), "0.8 ml");
}

#[rstest]
fn running_without_calibration_says_so() {
    let mut r = rig(MemoryStore::new());
    r.hold(200);
    assert_eq!(r.row(0), "Run");
    assert_eq!(r.row(1), "uncalibrated");
    assert_eq!(r.ctl.dispensed_tenths_ml(), None);
}

#[rstest]
fn press_in_menu_below_debounce_is_ignored() {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    assert_eq!(r.hold(10), SystemState::CalibrationMenu);
}

#[rstest]
fn full_edge_queue_drops_and_counts() {
    let mut r = rig(MemoryStore::new());
    for i in 0..40 {
        if i % 2 == 0 {
            r.down();
        } else {
            r.up();
        }
    }
    assert_eq!(r.ctl.input().dropped_edges(), 8);
    r.tick();
    assert_eq!(r.ctl.state(), SystemState::Idle);
}

#[rstest]
fn overflowing_release_burst_still_stops_purge() {
    let mut r = rig(MemoryStore::new());
    r.hold(5000);
    assert_eq!(r.hold(2500), SystemState::Purging);
    r.down();
    r.wait_ms(200);
    assert!(r.ctl.is_purge_active());

    // One edge more than the queue holds, ending on a release.
    for i in 0..=EDGE_QUEUE_DEPTH {
        if i % 2 == 0 {
            r.up();
        } else {
            r.down();
        }
    }
    assert_eq!(r.ctl.input().dropped_edges(), 1);
    r.tick();
    assert!(!r.ctl.input().is_pressed());

    let stopped = r.ctl.motor().position();
    r.wait_ms(3000);
    assert_eq!(r.ctl.motor().position(), stopped);
    assert_eq!(r.ctl.state(), SystemState::Idle);
}
