//! Sliding-window-log admission gate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Rate limiter tuning.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Admissions permitted per window.
    pub max_requests: usize,
    /// Length of the rolling window.
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_millis(60_000),
        }
    }
}

/// Global sliding-window-log rate limiter.
///
/// The ledger stores the timestamp of each admission still inside the rolling
/// window. Check-and-append is atomic under a single lock, so a concurrent
/// `try_admit` pair cannot overshoot the ceiling. Submissions and the queue
/// drain worker share one instance.
pub(crate) struct RateLimiter {
    settings: RateLimitSettings,
    ledger: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub(crate) fn new(settings: RateLimitSettings) -> Self {
        let capacity = settings.max_requests.min(1024);
        Self {
            settings,
            ledger: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Attempts one admission. Expired entries are pruned first; if the
    /// ledger is full the call is denied, otherwise the admission timestamp
    /// is appended.
    pub(crate) fn try_admit(&self) -> bool {
        let now = Instant::now();
        let mut ledger = self.ledger.lock().unwrap();

        while let Some(&oldest) = ledger.front() {
            if now.duration_since(oldest) >= self.settings.window {
                ledger.pop_front();
            } else {
                break;
            }
        }

        if ledger.len() >= self.settings.max_requests {
            return false;
        }

        ledger.push_back(now);
        true
    }

    /// Advisory hint: how long until the oldest admission ages out of the
    /// window. Zero when the ledger is empty.
    pub(crate) fn wait_hint(&self) -> Duration {
        let ledger = self.ledger.lock().unwrap();
        match ledger.front() {
            None => Duration::ZERO,
            Some(&oldest) => self
                .settings
                .window
                .saturating_sub(oldest.elapsed()),
        }
    }

    /// Number of admissions currently inside the window.
    #[allow(dead_code)]
    pub(crate) fn in_window(&self) -> usize {
        let now = Instant::now();
        let ledger = self.ledger.lock().unwrap();
        ledger
            .iter()
            .filter(|&&at| now.duration_since(at) < self.settings.window)
            .count()
    }
}
