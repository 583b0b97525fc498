//! Debounced input monitor.
//!
//! The button's interrupt side (`EdgeSender`) only timestamps a level change
//! and pushes it into a bounded queue without blocking. The control loop side
//! (`ButtonInput`) drains that queue, tracks the press in a `PressMonitor`, and
//! classifies each press-release cycle into at most one `PressEvent`.
//!
//! When the queue is full the oldest edge is evicted, so the most recent
//! level always reaches the monitor.
//!
//! The tracking flag and press-start timestamp belong to the monitor alone;
//! the interrupt side never reads them.
use crossbeam_channel as xch;
use dispenser_traits::{Clock, Level};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Capacity of the interrupt-to-loop edge queue.
pub const EDGE_QUEUE_DEPTH: usize = 32;

/// Duration thresholds shared by every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub debounce: Duration,
    pub short_max: Duration,
    pub long_min: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            short_max: Duration::from_millis(1500),
            long_min: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressKind {
    /// Shorter than the debounce time; never delivered downstream.
    Bounce,
    Short,
    Long,
}

impl Thresholds {
    /// Classify a press-release duration. Durations between `short_max` and
    /// `long_min` have no category of their own and count as short.
    pub fn classify(&self, d: Duration) -> PressKind {
        if d < self.debounce {
            PressKind::Bounce
        } else if d >= self.long_min {
            PressKind::Long
        } else {
            PressKind::Short
        }
    }

    /// True for durations in the gap between short and long presses.
    pub fn in_gap(&self, d: Duration) -> bool {
        d > self.short_max && d < self.long_min
    }
}

/// One classified press-release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressEvent {
    pub start: Instant,
    pub duration: Duration,
    pub kind: PressKind,
}

impl PressEvent {
    pub fn end(&self) -> Instant {
        self.start + self.duration
    }
}

/// Turns raw level changes into press events.
#[derive(Debug)]
pub struct PressMonitor {
    thresholds: Thresholds,
    active_low: bool,
    pressed_at: Option<Instant>,
    last_release: Option<Instant>,
}

impl PressMonitor {
    pub fn new(thresholds: Thresholds, active_low: bool) -> Self {
        Self {
            thresholds,
            active_low,
            pressed_at: None,
            last_release: None,
        }
    }

    /// Feed one raw transition. Returns an event only on the release that ends
    /// a tracked press lasting at least the debounce time.
    pub fn on_level_change(&mut self, level: Level, at: Instant) -> Option<PressEvent> {
        let pressed = (level == Level::Low) == self.active_low;
        if pressed {
            if self.pressed_at.is_none() {
                self.pressed_at = Some(at);
                tracing::trace!("button down");
            }
            return None;
        }

        let start = self.pressed_at.take()?;
        self.last_release = Some(at);
        let duration = at.saturating_duration_since(start);
        let kind = self.thresholds.classify(duration);
        let ms = duration.as_millis() as u64;
        match kind {
            PressKind::Bounce => {
                tracing::trace!(ms, "bounce discarded");
                None
            }
            _ => {
                if self.thresholds.in_gap(duration) {
                    tracing::debug!(ms, "press between short and long thresholds; treated as short");
                }
                tracing::debug!(ms, ?kind, "press");
                Some(PressEvent {
                    start,
                    duration,
                    kind,
                })
            }
        }
    }

    /// Start of the press currently held, if any.
    pub fn pressed_since(&self) -> Option<Instant> {
        self.pressed_at
    }

    /// Time of the most recent release, bounces included.
    pub fn last_release(&self) -> Option<Instant> {
        self.last_release
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

/// A level change captured in interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdge {
    pub level: Level,
    pub at: Instant,
}

/// Interrupt-side handle. Cheap to clone; every method is non-blocking.
#[derive(Clone)]
pub struct EdgeSender {
    tx: xch::Sender<RawEdge>,
    evict: xch::Receiver<RawEdge>,
    clock: Arc<dyn Clock + Send + Sync>,
    dropped: Arc<AtomicU32>,
}

impl EdgeSender {
    /// Call from the pin-change handler. Stamps the edge and queues it.
    pub fn on_level_change(&self, level: Level) {
        let at = self.clock.now();
        self.record(RawEdge { level, at });
    }

    /// Queue an edge with a caller-supplied timestamp. A full queue evicts
    /// its oldest edge to make room and bumps the drop counter.
    pub fn record(&self, edge: RawEdge) {
        let mut edge = edge;
        loop {
            match self.tx.try_send(edge) {
                Ok(()) => return,
                Err(xch::TrySendError::Full(e)) => {
                    edge = e;
                    // The loop may have drained it first; then the retry fits.
                    if self.evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(xch::TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Control-loop side of the button.
pub struct ButtonInput {
    rx: xch::Receiver<RawEdge>,
    dropped: Arc<AtomicU32>,
    reported_drops: u32,
    monitor: PressMonitor,
}

impl core::fmt::Debug for ButtonInput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ButtonInput")
            .field("queued", &self.rx.len())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .field("monitor", &self.monitor)
            .finish()
    }
}

impl ButtonInput {
    /// Drain queued edges until one completes a press event.
    ///
    /// Edges after that event stay queued for the next call, so the monitor's
    /// view of the button only advances as far as the events handed out.
    pub fn poll(&mut self) -> Option<PressEvent> {
        self.report_drops();
        while let Ok(edge) = self.rx.try_recv() {
            if let Some(ev) = self.monitor.on_level_change(edge.level, edge.at) {
                return Some(ev);
            }
        }
        None
    }

    pub fn is_pressed(&self) -> bool {
        self.monitor.pressed_since().is_some()
    }

    pub fn pressed_since(&self) -> Option<Instant> {
        self.monitor.pressed_since()
    }

    pub fn last_release(&self) -> Option<Instant> {
        self.monitor.last_release()
    }

    pub fn thresholds(&self) -> &Thresholds {
        self.monitor.thresholds()
    }

    /// Total edges evicted from a full queue.
    pub fn dropped_edges(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn report_drops(&mut self) {
        let n = self.dropped_edges();
        if n != self.reported_drops {
            tracing::warn!(
                dropped = n - self.reported_drops,
                total = n,
                "oldest button edges evicted; queue full"
            );
            self.reported_drops = n;
        }
    }
}

/// Create the two halves of the button path.
pub fn edge_channel(
    thresholds: Thresholds,
    active_low: bool,
    clock: Arc<dyn Clock + Send + Sync>,
) -> (EdgeSender, ButtonInput) {
    let (tx, rx) = xch::bounded(EDGE_QUEUE_DEPTH);
    let dropped = Arc::new(AtomicU32::new(0));
    (
        EdgeSender {
            tx,
            evict: rx.clone(),
            clock,
            dropped: dropped.clone(),
        },
        ButtonInput {
            rx,
            dropped,
            reported_drops: 0,
            monitor: PressMonitor::new(thresholds, active_low),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispenser_traits::MonotonicClock;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn classify_boundaries() {
        let t = Thresholds::default();
        assert_eq!(t.classify(ms(49)), PressKind::Bounce);
        assert_eq!(t.classify(ms(50)), PressKind::Short);
        assert_eq!(t.classify(ms(1500)), PressKind::Short);
        assert_eq!(t.classify(ms(3000)), PressKind::Short);
        assert_eq!(t.classify(ms(4999)), PressKind::Short);
        assert_eq!(t.classify(ms(5000)), PressKind::Long);
        assert!(t.in_gap(ms(1501)));
        assert!(!t.in_gap(ms(1500)));
        assert!(!t.in_gap(ms(5000)));
    }

    #[test]
    fn repeated_press_edges_keep_first_start() {
        let mut m = PressMonitor::new(Thresholds::default(), true);
        let t0 = Instant::now();
        assert!(m.on_level_change(Level::Low, t0).is_none());
        assert!(m.on_level_change(Level::Low, t0 + ms(30)).is_none());
        let ev = m.on_level_change(Level::High, t0 + ms(200)).unwrap();
        assert_eq!(ev.start, t0);
        assert_eq!(ev.duration, ms(200));
        // A stray release with nothing tracked emits nothing.
        assert!(m.on_level_change(Level::High, t0 + ms(250)).is_none());
        assert_eq!(m.last_release(), Some(t0 + ms(200)));
    }

    #[test]
    fn active_high_button_inverts_levels() {
        let mut m = PressMonitor::new(Thresholds::default(), false);
        let t0 = Instant::now();
        assert!(m.on_level_change(Level::High, t0).is_none());
        assert!(m.pressed_since().is_some());
        let ev = m.on_level_change(Level::Low, t0 + ms(100)).unwrap();
        assert_eq!(ev.kind, PressKind::Short);
    }

    #[test]
    fn full_queue_counts_drops() {
        let (tx, mut input) =
            edge_channel(Thresholds::default(), true, Arc::new(MonotonicClock::new()));
        let t0 = Instant::now();
        for i in 0..(EDGE_QUEUE_DEPTH as u64 + 3) {
            tx.record(RawEdge {
                level: Level::Low,
                at: t0 + ms(i),
            });
        }
        assert_eq!(input.dropped_edges(), 3);
        assert!(input.poll().is_none());
        assert!(input.is_pressed());
    }

    #[test]
    fn full_queue_keeps_newest_edge() {
        let (tx, mut input) =
            edge_channel(Thresholds::default(), true, Arc::new(MonotonicClock::new()));
        let t0 = Instant::now();
        tx.record(RawEdge {
            level: Level::Low,
            at: t0,
        });
        assert!(input.poll().is_none());
        for i in 0..=EDGE_QUEUE_DEPTH as u64 {
            let level = if i % 2 == 0 { Level::High } else { Level::Low };
            tx.record(RawEdge {
                level,
                at: t0 + ms(100 + i),
            });
        }
        assert_eq!(input.dropped_edges(), 1);
        while input.poll().is_some() {}
        assert!(!input.is_pressed());
        assert_eq!(input.last_release(), Some(t0 + ms(100 + EDGE_QUEUE_DEPTH as u64)));
    }
}
