use std::io::{self, Write};
use std::time::Instant;

/// Advisory progress/log callbacks for a formatting run. Implementations
/// must tolerate being called from any thread and any number of times;
/// percentages are monotonically non-decreasing but carry no other ordering
/// guarantee.
pub trait ProgressSink {
    fn progress(&self, percent: &str);
    fn log(&self, message: &str);
}

/// Discards everything; handy for tests and silent embedding.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&self, _percent: &str) {}
    fn log(&self, _message: &str) {}
}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    fn line(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {msg}");
    }
}

impl ProgressSink for ConsoleProgress {
    fn progress(&self, percent: &str) {
        self.line(&format!("formatting {percent}"));
    }

    fn log(&self, message: &str) {
        self.line(message);
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
