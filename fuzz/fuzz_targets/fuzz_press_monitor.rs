#![no_main]
use std::time::{Duration, Instant};

use dispenser_core::{PressKind, PressMonitor, Thresholds};
use dispenser_traits::Level;
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Edge {
    high: bool,
    gap_ms: u16,
}

fuzz_target!(|edges: Vec<Edge>| {
    let mut m = PressMonitor::new(Thresholds::default(), true);
    let t = m.thresholds().to_owned();
    let mut now = Instant::now();
    for e in edges {
        now += Duration::from_millis(u64::from(e.gap_ms));
        let level = if e.high { Level::High } else { Level::Low };
        if let Some(ev) = m.on_level_change(level, now) {
            // Events only come from releases, never carry a bounce, and match their kind.
            assert!(e.high);
            assert_ne!(ev.kind, PressKind::Bounce);
            assert_eq!(ev.kind, t.classify(ev.duration));
            assert_eq!(ev.end(), now);
        }
    }
});
