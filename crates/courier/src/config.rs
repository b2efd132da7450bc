//! Engine configuration.

use crate::breaker::{BreakerSettings, BreakerState};
use crate::coordinator::Courier;
use crate::events::{BreakerEvent, CourierEvent};
use crate::limiter::RateLimitSettings;
use crate::registry::DeliveryReceipt;
use crate::transport::Transport;
use courier_core::{EventSubscriber, FnSubscriber, SubscriberSet};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`Courier`] engine.
pub struct CourierConfig {
    pub(crate) name: String,
    pub(crate) providers: Vec<Arc<dyn Transport>>,
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) attempt_timeout: Duration,
    pub(crate) rate_limit: RateLimitSettings,
    pub(crate) breaker: BreakerSettings,
    pub(crate) drain_interval: Duration,
    pub(crate) subscribers: SubscriberSet<CourierEvent>,
    pub(crate) breaker_subscribers: SubscriberSet<BreakerEvent>,
}

impl CourierConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CourierConfigBuilder {
        CourierConfigBuilder::new()
    }
}

/// Builder for [`CourierConfig`].
pub struct CourierConfigBuilder {
    name: String,
    providers: Vec<Arc<dyn Transport>>,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    attempt_timeout: Duration,
    rate_limit: RateLimitSettings,
    breaker: BreakerSettings,
    drain_interval: Duration,
    subscribers: SubscriberSet<CourierEvent>,
    breaker_subscribers: SubscriberSet<BreakerEvent>,
}

impl Default for CourierConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CourierConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_retries: 3 (4 attempts per provider)
    /// - base_delay: 1 second
    /// - max_delay: 30 seconds
    /// - attempt_timeout: 30 seconds
    /// - rate limit: 100 admissions per 60 seconds
    /// - breaker: 5 consecutive failures, 60 second cooldown
    /// - drain_interval: 1 second
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            providers: Vec::new(),
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            attempt_timeout: Duration::from_millis(30_000),
            rate_limit: RateLimitSettings::default(),
            breaker: BreakerSettings::default(),
            drain_interval: Duration::from_secs(1),
            subscribers: SubscriberSet::new(),
            breaker_subscribers: SubscriberSet::new(),
        }
    }

    /// Appends a provider. Fallback order is append order.
    pub fn provider(mut self, transport: Arc<dyn Transport>) -> Self {
        self.providers.push(transport);
        self
    }

    /// Replaces the provider list. Fallback order is list order.
    pub fn providers<I>(mut self, transports: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Transport>>,
    {
        self.providers = transports.into_iter().collect();
        self
    }

    /// Sets the number of retries per provider after the first attempt.
    ///
    /// Total attempts per provider = `max_retries + 1`.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base backoff delay between retries.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound on a single backoff delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the per-attempt upper bound. An attempt exceeding it is treated
    /// as a transient failure.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the global admission ceiling: `max_requests` per `window`.
    pub fn rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limit = RateLimitSettings {
            max_requests,
            window,
        };
        self
    }

    /// Sets the consecutive-failure threshold that opens a provider's breaker.
    pub fn breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker.threshold = threshold;
        self
    }

    /// Sets how long an open breaker refuses calls before admitting a probe.
    pub fn breaker_cooldown(mut self, cooldown: Duration) -> Self {
        self.breaker.cooldown = cooldown;
        self
    }

    /// Sets the drain worker wake interval.
    pub fn drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Sets the name for this engine instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for successful deliveries.
    ///
    /// Called with the fingerprint and the cached delivery receipt. Cache
    /// hits do not fire this callback.
    pub fn on_sent<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &DeliveryReceipt) + Send + Sync + 'static,
    {
        self.subscribers.add(FnSubscriber::new(move |event| {
            if let CourierEvent::Sent {
                fingerprint,
                receipt,
                ..
            } = event
            {
                f(fingerprint, receipt);
            }
        }));
        self
    }

    /// Registers a callback for exhausted submissions.
    ///
    /// Called with the fingerprint and the last transient error description.
    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.subscribers.add(FnSubscriber::new(move |event| {
            if let CourierEvent::Failed {
                fingerprint, error, ..
            } = event
            {
                f(fingerprint, error);
            }
        }));
        self
    }

    /// Registers a callback for rate-denied submissions entering the
    /// deferred queue. Called with the fingerprint.
    pub fn on_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribers.add(FnSubscriber::new(move |event| {
            if let CourierEvent::Queued { fingerprint, .. } = event {
                f(fingerprint);
            }
        }));
        self
    }

    /// Registers a callback for breaker state transitions.
    ///
    /// Called with the provider name and the states before and after.
    pub fn on_breaker_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, BreakerState, BreakerState) + Send + Sync + 'static,
    {
        self.breaker_subscribers
            .add(FnSubscriber::new(move |event: &BreakerEvent| {
                if let BreakerEvent::StateTransition {
                    breaker, from, to, ..
                } = event
                {
                    f(breaker, *from, *to);
                }
            }));
        self
    }

    /// Registers a raw subscriber for coordinator events.
    pub fn subscribe<S>(mut self, subscriber: S) -> Self
    where
        S: EventSubscriber<CourierEvent> + 'static,
    {
        self.subscribers.add(subscriber);
        self
    }

    /// Registers a raw subscriber for breaker events.
    pub fn subscribe_breakers<S>(mut self, subscriber: S) -> Self
    where
        S: EventSubscriber<BreakerEvent> + 'static,
    {
        self.breaker_subscribers.add(subscriber);
        self
    }

    /// Builds the engine and starts its drain worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Courier {
        Courier::new(CourierConfig {
            name: self.name,
            providers: self.providers,
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            attempt_timeout: self.attempt_timeout,
            rate_limit: self.rate_limit,
            breaker: self.breaker,
            drain_interval: self.drain_interval,
            subscribers: self.subscribers,
            breaker_subscribers: self.breaker_subscribers,
        })
    }
}
