//! Debug-frame liveness window
//!
//! A consumer (the telemetry stream) renews the window every time it wants a
//! fresh debug frame. While the last renewal is younger than the window the
//! capture thread renders and encodes; otherwise rendering is skipped.
//!
//! **App Start Relative Time Pattern**: timestamps are microseconds since a
//! process-wide monotonic anchor, so they fit in an `AtomicU64` and the
//! capture thread can check the window without taking a lock.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static APP_START: OnceLock<Instant> = OnceLock::new();

/// Monotonic microseconds since the anchor, shifted by one so that `0`
/// can mean "never requested".
fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64 + 1
}

const NEVER: u64 = 0;

/// Liveness window for debug-frame requests
#[derive(Debug)]
pub struct LivenessWindow {
    last_request: AtomicU64,
    window_us: AtomicU64,
}

impl LivenessWindow {
    /// Create a window that starts inactive
    pub fn new(window: Duration) -> Self {
        // Pin the anchor before any request can be stored
        let _ = monotonic_micros();
        Self {
            last_request: AtomicU64::new(NEVER),
            window_us: AtomicU64::new(window.as_micros() as u64),
        }
    }

    /// Renew the window
    pub fn request(&self) {
        self.last_request.store(monotonic_micros(), Ordering::Relaxed);
    }

    /// True if a request was made within the window
    pub fn is_active(&self) -> bool {
        match self.since_last_request() {
            Some(elapsed) => elapsed < self.window(),
            None => false,
        }
    }

    /// Time since the last request, `None` if never requested
    pub fn since_last_request(&self) -> Option<Duration> {
        let last = self.last_request.load(Ordering::Relaxed);
        if last == NEVER {
            return None;
        }
        Some(Duration::from_micros(monotonic_micros().saturating_sub(last)))
    }

    pub fn window(&self) -> Duration {
        Duration::from_micros(self.window_us.load(Ordering::Relaxed))
    }

    pub fn set_window(&self, window: Duration) {
        self.window_us
            .store(window.as_micros() as u64, Ordering::Relaxed);
    }
}
