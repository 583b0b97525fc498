//! Scripted button for the simulated backend.
//!
//! Each stdin line is one command. The script thread plays the commands in
//! real time through the same `EdgeSender` a pin interrupt would use.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use dispenser_core::EdgeSender;
use dispenser_traits::{Clock, Level};
use thiserror::Error;

const SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Press,
    Release,
    Wait(Duration),
    Quit,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script line {line}: unknown command `{cmd}`")]
    Unknown { line: usize, cmd: String },
    #[error("script line {line}: `{cmd}` needs a duration in milliseconds")]
    BadDuration { line: usize, cmd: String },
    #[error("reading button script: {0}")]
    Io(#[from] std::io::Error),
}

/// How long the `short` and `long` shorthands hold the button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub short: Duration,
    pub long: Duration,
}

impl From<&dispenser_config::ButtonCfg> for Timing {
    fn from(b: &dispenser_config::ButtonCfg) -> Self {
        let short = 200u64.max(b.debounce_ms * 2).min(b.short_max_ms);
        Self {
            short: Duration::from_millis(short),
            long: Duration::from_millis(b.long_min_ms + 100),
        }
    }
}

fn tap(hold: Duration) -> Vec<Step> {
    vec![Step::Press, Step::Wait(hold), Step::Release]
}

/// Parse one script line. Blank lines and `#` comments yield no steps.
pub fn parse_line(line: usize, text: &str, timing: Timing) -> Result<Vec<Step>, ScriptError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(Vec::new());
    }
    let mut words = text.split_whitespace();
    let cmd = words.next().unwrap_or_default();
    let ms = |words: &mut std::str::SplitWhitespace<'_>| {
        words
            .next()
            .and_then(|w| w.parse::<u64>().ok())
            .map(Duration::from_millis)
            .ok_or_else(|| ScriptError::BadDuration {
                line,
                cmd: cmd.to_string(),
            })
    };
    let steps = match cmd {
        "short" => tap(timing.short),
        "long" => tap(timing.long),
        "hold" => tap(ms(&mut words)?),
        "press" => vec![Step::Press],
        "release" => vec![Step::Release],
        "wait" => vec![Step::Wait(ms(&mut words)?)],
        "quit" => vec![Step::Quit],
        other => {
            return Err(ScriptError::Unknown {
                line,
                cmd: other.to_string(),
            });
        }
    };
    Ok(steps)
}

/// Play a script on a background thread. The thread raises `shutdown` when
/// the script ends, on `quit`, or on error, and stops early once `shutdown`
/// is raised elsewhere.
pub fn spawn<R>(
    reader: R,
    timing: Timing,
    active_low: bool,
    edges: EdgeSender,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<Result<(), ScriptError>>
where
    R: BufRead + Send + 'static,
{
    let (pressed, released) = if active_low {
        (Level::Low, Level::High)
    } else {
        (Level::High, Level::Low)
    };
    std::thread::spawn(move || {
        let result = (|| -> Result<(), ScriptError> {
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                for step in parse_line(i + 1, &line, timing)? {
                    if shutdown.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    match step {
                        Step::Press => edges.on_level_change(pressed),
                        Step::Release => edges.on_level_change(released),
                        Step::Wait(d) => sleep_unless_shutdown(clock.as_ref(), d, &shutdown),
                        Step::Quit => return Ok(()),
                    }
                }
            }
            Ok(())
        })();
        if let Err(e) = &result {
            tracing::error!(error = %e, "button script failed");
        }
        shutdown.store(true, Ordering::SeqCst);
        result
    })
}

fn sleep_unless_shutdown(clock: &dyn Clock, d: Duration, shutdown: &AtomicBool) {
    let mut left = d;
    while !left.is_zero() && !shutdown.load(Ordering::SeqCst) {
        let slice = left.min(SLEEP_SLICE);
        clock.sleep(slice);
        left -= slice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const T: Timing = Timing {
        short: Duration::from_millis(200),
        long: Duration::from_millis(5100),
    };

    #[rstest]
    #[case("short", tap(Duration::from_millis(200)))]
    #[case("long", tap(Duration::from_millis(5100)))]
    #[case("hold 2500", tap(Duration::from_millis(2500)))]
    #[case("  wait 30 ", vec![Step::Wait(Duration::from_millis(30))])]
    #[case("press", vec![Step::Press])]
    #[case("quit", vec![Step::Quit])]
    #[case("# comment", vec![])]
    #[case("", vec![])]
    fn parses(#[case] text: &str, #[case] expected: Vec<Step>) {
        assert_eq!(parse_line(1, text, T).unwrap(), expected);
    }

    #[rstest]
    #[case("hold")]
    #[case("wait soon")]
    fn rejects_missing_duration(#[case] text: &str) {
        assert!(matches!(parse_line(3, text, T), Err(ScriptError::BadDuration { line: 3, .. })));
    }

    #[test]
    fn rejects_unknown() {
        let err = parse_line(7, "jump", T).unwrap_err();
        assert_eq!(err.to_string(), "script line 7: unknown command `jump`");
    }

    #[test]
    fn timing_follows_button_config() {
        let b = dispenser_config::ButtonCfg::default();
        let t = Timing::from(&b);
        assert_eq!(t.short, Duration::from_millis(200));
        assert_eq!(t.long, Duration::from_millis(5100));
    }
}
