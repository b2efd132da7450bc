//! Per-provider circuit breaker.
//!
//! A three-state gate keyed on consecutive failures. `threshold` consecutive
//! failures open the circuit; after `cooldown` the next acquisition moves it
//! to half-open and lets a probe through. A half-open failure does not
//! immediately re-open: the failure counter restarts when the probe window
//! opens and the circuit re-opens only once it crosses the threshold again.

use crate::events::BreakerEvent;
use courier_core::SubscriberSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls are allowed.
    Closed,
    /// Calls are refused until the cooldown elapses.
    Open,
    /// Probing; calls are allowed and the outcome decides the next state.
    HalfOpen,
}

impl BreakerState {
    /// Stable lowercase label, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker tuning shared by every provider.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures required to open the circuit.
    pub threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown: Duration::from_millis(60_000),
        }
    }
}

struct BreakerCore {
    state: BreakerState,
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

enum Acquire {
    Permit,
    Probe,
    Reject,
}

pub(crate) struct Breaker {
    name: String,
    settings: BreakerSettings,
    subscribers: SubscriberSet<BreakerEvent>,
    inner: Mutex<BreakerCore>,
}

impl Breaker {
    pub(crate) fn new(
        name: impl Into<String>,
        settings: BreakerSettings,
        subscribers: SubscriberSet<BreakerEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            subscribers,
            inner: Mutex::new(BreakerCore {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                open_until: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub(crate) fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_failures
    }

    /// Gate for one attempt. Returns false when the call must be refused
    /// without invoking the transport.
    pub(crate) fn try_acquire(&self) -> bool {
        let decision = {
            let mut core = self.inner.lock().unwrap();
            match core.state {
                BreakerState::Closed | BreakerState::HalfOpen => Acquire::Permit,
                BreakerState::Open => {
                    let cooled = core
                        .open_until
                        .map_or(true, |until| Instant::now() >= until);
                    if cooled {
                        core.state = BreakerState::HalfOpen;
                        core.consecutive_failures = 0;
                        core.open_until = None;
                        Acquire::Probe
                    } else {
                        Acquire::Reject
                    }
                }
            }
        };

        match decision {
            Acquire::Permit => true,
            Acquire::Probe => {
                self.publish_transition(BreakerState::Open, BreakerState::HalfOpen);
                true
            }
            Acquire::Reject => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.name, "call rejected: breaker open");

                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "courier_breaker_rejections_total",
                    "breaker" => self.name.clone()
                )
                .increment(1);

                self.subscribers.publish(&BreakerEvent::CallRejected {
                    breaker: self.name.clone(),
                    timestamp: std::time::Instant::now(),
                });
                false
            }
        }
    }

    pub(crate) fn record_success(&self) {
        let closed_from = {
            let mut core = self.inner.lock().unwrap();
            core.consecutive_failures = 0;
            if core.state == BreakerState::HalfOpen {
                core.state = BreakerState::Closed;
                core.open_until = None;
                Some(BreakerState::HalfOpen)
            } else {
                None
            }
        };

        if let Some(from) = closed_from {
            self.publish_transition(from, BreakerState::Closed);
        }
    }

    pub(crate) fn record_failure(&self) {
        let opened_from = {
            let mut core = self.inner.lock().unwrap();
            core.consecutive_failures += 1;
            if core.consecutive_failures >= self.settings.threshold
                && core.state != BreakerState::Open
            {
                let from = core.state;
                core.state = BreakerState::Open;
                core.open_until = Some(Instant::now() + self.settings.cooldown);
                Some(from)
            } else {
                None
            }
        };

        if let Some(from) = opened_from {
            self.publish_transition(from, BreakerState::Open);
        }
    }

    fn publish_transition(&self, from: BreakerState, to: BreakerState) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %self.name,
            from = from.as_str(),
            to = to.as_str(),
            "breaker state transition"
        );

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "courier_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);

        self.subscribers.publish(&BreakerEvent::StateTransition {
            breaker: self.name.clone(),
            timestamp: std::time::Instant::now(),
            from,
            to,
        });
    }
}
