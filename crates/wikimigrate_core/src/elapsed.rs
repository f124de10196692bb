use std::time::{Duration, Instant};

use log::info;

/// Logs `<label> finished. Execution time: MM:SS.` when dropped, whichever way the scope exits.
#[derive(Debug)]
pub struct ElapsedTimer {
    label: &'static str,
    started: Instant,
}

impl ElapsedTimer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        info!(
            "{} finished. Execution time: {}.",
            self.label,
            format_elapsed(self.elapsed())
        );
    }
}

/// Whole minutes and seconds, zero padded. Minutes are not wrapped into hours.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
