//! Collapses the burst of filesystem events a single save produces.

use std::time::{Duration, Instant};

/// Window applied when no explicit debounce is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Accept-gate over a stream of change signals.
///
/// A signal is accepted when at least `window` has elapsed since the last
/// accepted signal. Rejected signals do not move the window: a file saved
/// every half window still syncs once per window instead of never.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    window: Duration,
    last: Option<Instant>,
}

impl DebounceGate {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Gate a signal arriving now.
    pub fn accept(&mut self) -> bool {
        self.accept_at(Instant::now())
    }

    /// Gate a signal with an explicit arrival time.
    pub fn accept_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
