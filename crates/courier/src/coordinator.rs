//! The send coordinator.
//!
//! `Courier` sequences fingerprinting, admission control, provider selection
//! with bounded retry and ordered fallback, breaker gating, deferred-queue
//! draining, result caching, and event emission. Submissions are safe to run
//! concurrently; dispatch is serialized per fingerprint so a unique message
//! is handed to at most one transport.

use crate::breaker::{Breaker, BreakerState};
use crate::config::{CourierConfig, CourierConfigBuilder};
use crate::error::{SubmitError, TransportError};
use crate::events::CourierEvent;
use crate::fingerprint::fingerprint;
use crate::limiter::RateLimiter;
use crate::message::Message;
use crate::queue::DeferredQueue;
use crate::registry::{
    AttemptOutcome, AttemptRecord, DeliveryReceipt, DispatchStatus, ResultRegistry,
};
use crate::transport::Transport;
use chrono::Utc;
use courier_core::SubscriberSet;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Resolution of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Delivered (or replayed from the idempotency cache).
    Sent(DeliveryReceipt),
    /// Rate-denied and parked in the deferred queue.
    Queued {
        /// Fingerprint to poll with [`Courier::status`].
        fingerprint: String,
    },
    /// Every provider was exhausted.
    Failed {
        /// Fingerprint of the failed message.
        fingerprint: String,
        /// Description of the last transient error.
        error: String,
    },
}

impl SubmitOutcome {
    /// Returns the delivery receipt for a `Sent` outcome.
    pub fn receipt(&self) -> Option<&DeliveryReceipt> {
        match self {
            SubmitOutcome::Sent(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// True when the message was delivered.
    pub fn is_sent(&self) -> bool {
        matches!(self, SubmitOutcome::Sent(_))
    }

    /// True when the message was deferred.
    pub fn is_queued(&self) -> bool {
        matches!(self, SubmitOutcome::Queued { .. })
    }
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Fingerprints ever observed.
    pub total_observed: usize,
    /// Fingerprints currently `Sent`.
    pub sent: usize,
    /// Fingerprints currently `Failed`.
    pub failed: usize,
    /// Fingerprints currently parked in the queue.
    pub queued: usize,
    /// `sent / total_observed` as a percentage, e.g. `"97.50%"`.
    pub success_rate: String,
    /// Per-provider breaker view, in fallback order.
    pub providers: Vec<ProviderSnapshot>,
}

/// Breaker view of a single provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSnapshot {
    /// Transport name.
    pub name: String,
    /// Current breaker state.
    pub breaker_state: BreakerState,
    /// Current consecutive-failure count.
    pub failure_count: u32,
}

struct ProviderSlot {
    transport: Arc<dyn Transport>,
    breaker: Breaker,
}

struct CourierInner {
    name: String,
    providers: Vec<ProviderSlot>,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    attempt_timeout: Duration,
    limiter: RateLimiter,
    queue: DeferredQueue,
    registry: ResultRegistry,
    subscribers: SubscriberSet<CourierEvent>,
}

/// The send-coordination engine.
///
/// Construct through [`Courier::builder`]; building spawns the background
/// drain worker, so the engine must be created inside a tokio runtime.
pub struct Courier {
    inner: Arc<CourierInner>,
    shutdown: watch::Sender<bool>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl Courier {
    /// Creates a new configuration builder.
    pub fn builder() -> CourierConfigBuilder {
        CourierConfigBuilder::new()
    }

    /// Builds the engine from a finished configuration and starts the drain
    /// worker.
    pub fn new(config: CourierConfig) -> Self {
        let providers = config
            .providers
            .into_iter()
            .map(|transport| {
                let breaker = Breaker::new(
                    transport.name(),
                    config.breaker.clone(),
                    config.breaker_subscribers.clone(),
                );
                ProviderSlot { transport, breaker }
            })
            .collect();

        let inner = Arc::new(CourierInner {
            name: config.name,
            providers,
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            attempt_timeout: config.attempt_timeout,
            limiter: RateLimiter::new(config.rate_limit),
            queue: DeferredQueue::new(),
            registry: ResultRegistry::new(),
            subscribers: config.subscribers,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let drain = tokio::spawn(drain_loop(
            Arc::clone(&inner),
            shutdown_rx,
            config.drain_interval,
        ));

        Self {
            inner,
            shutdown,
            drain: Mutex::new(Some(drain)),
        }
    }

    /// Submits a message for delivery.
    ///
    /// Returns `Ok` for every transport-layer outcome; `Err` is reserved for
    /// caller programming errors (malformed message, engine already shut
    /// down). A fingerprint with a cached receipt is replayed without any
    /// transport attempt and without emitting events.
    pub async fn submit(&self, message: Message) -> Result<SubmitOutcome, SubmitError> {
        message.validate()?;
        if *self.shutdown.borrow() {
            return Err(SubmitError::ShutDown);
        }

        let fingerprint = fingerprint(&message);

        if let Some(receipt) = self.inner.registry.cached_receipt(&fingerprint) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                engine = %self.inner.name,
                fingerprint = %fingerprint,
                "replayed from idempotency cache"
            );
            return Ok(SubmitOutcome::Sent(receipt));
        }

        if !self.inner.limiter.try_admit() {
            self.inner.registry.mark_queued(&fingerprint);
            self.inner.queue.push(message.clone(), fingerprint.clone());

            #[cfg(feature = "tracing")]
            tracing::info!(
                engine = %self.inner.name,
                fingerprint = %fingerprint,
                queue_depth = self.inner.queue.len(),
                "admission denied, deferred to queue"
            );

            #[cfg(feature = "metrics")]
            metrics::counter!(
                "courier_submissions_total",
                "engine" => self.inner.name.clone(),
                "outcome" => "queued"
            )
            .increment(1);

            self.inner.subscribers.publish(&CourierEvent::Queued {
                engine: self.inner.name.clone(),
                timestamp: std::time::Instant::now(),
                fingerprint: fingerprint.clone(),
                message,
            });

            return Ok(SubmitOutcome::Queued { fingerprint });
        }

        Ok(self.inner.dispatch(message, fingerprint).await)
    }

    /// Returns the status snapshot for a fingerprint, if it was ever
    /// observed.
    pub fn status(&self, fingerprint: &str) -> Option<DispatchStatus> {
        self.inner.registry.status(fingerprint)
    }

    /// Advisory hint: how long until the rate limiter frees a slot.
    pub fn wait_hint(&self) -> Duration {
        self.inner.limiter.wait_hint()
    }

    /// Returns point-in-time engine statistics.
    pub fn snapshot(&self) -> EngineSnapshot {
        let counts = self.inner.registry.counts();
        let success_rate = if counts.total == 0 {
            "0.00%".to_string()
        } else {
            format!(
                "{:.2}%",
                counts.sent as f64 / counts.total as f64 * 100.0
            )
        };

        EngineSnapshot {
            total_observed: counts.total,
            sent: counts.sent,
            failed: counts.failed,
            queued: counts.queued,
            success_rate,
            providers: self
                .inner
                .providers
                .iter()
                .map(|slot| ProviderSnapshot {
                    name: slot.transport.name().to_string(),
                    breaker_state: slot.breaker.state(),
                    failure_count: slot.breaker.failure_count(),
                })
                .collect(),
        }
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stops the drain worker and waits for it to exit. In-flight
    /// submissions resolve normally; new submissions are refused.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.drain.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(engine = %self.inner.name, "engine shut down");
    }
}

impl Drop for Courier {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.drain.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl CourierInner {
    /// The dispatch path shared by `submit` and the drain worker: provider
    /// loop with bounded retry, breaker gating, backoff, and terminal
    /// bookkeeping. Admission is the caller's responsibility.
    async fn dispatch(&self, message: Message, fingerprint: String) -> SubmitOutcome {
        let gate = self.registry.dispatch_gate(&fingerprint);
        let _serialized = gate.lock().await;

        // A concurrent or earlier dispatch may have resolved this
        // fingerprint while we waited on the gate.
        if let Some(receipt) = self.registry.cached_receipt(&fingerprint) {
            return SubmitOutcome::Sent(receipt);
        }

        self.registry.begin_cycle(&fingerprint);

        let mut first_of_cycle = true;
        let mut total_attempts: u32 = 0;
        let mut last_error: Option<String> = None;

        for slot in &self.providers {
            let transport_name = slot.transport.name().to_string();

            for attempt in 0..=self.max_retries {
                let ordinal = attempt + 1;
                self.registry
                    .begin_attempt(&fingerprint, &transport_name, ordinal, first_of_cycle);

                if !slot.breaker.try_acquire() {
                    // Breaker refusals consume no retry budget: abandon this
                    // provider and fall through to the next one immediately.
                    self.registry.record_attempt(
                        &fingerprint,
                        AttemptRecord {
                            transport: transport_name.clone(),
                            ordinal,
                            outcome: AttemptOutcome::BreakerOpen,
                            at: Utc::now(),
                        },
                        None,
                    );

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        engine = %self.name,
                        fingerprint = %fingerprint,
                        transport = %transport_name,
                        "breaker open, falling through to next provider"
                    );
                    break;
                }

                first_of_cycle = false;
                total_attempts += 1;

                let outcome = match tokio::time::timeout(
                    self.attempt_timeout,
                    slot.transport.send(&message),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(self.attempt_timeout)),
                };

                match outcome {
                    Ok(transport_receipt) => {
                        slot.breaker.record_success();
                        self.registry.record_attempt(
                            &fingerprint,
                            AttemptRecord {
                                transport: transport_name.clone(),
                                ordinal,
                                outcome: AttemptOutcome::Delivered,
                                at: Utc::now(),
                            },
                            None,
                        );

                        let receipt = DeliveryReceipt {
                            fingerprint: fingerprint.clone(),
                            delivery_id: transport_receipt.delivery_id,
                            transport: transport_receipt.transport,
                            completed_at: transport_receipt.timestamp,
                            attempts: total_attempts,
                        };
                        self.registry.store_receipt(receipt.clone());
                        self.registry.mark_sent(&fingerprint, &transport_name, ordinal);

                        #[cfg(feature = "tracing")]
                        tracing::info!(
                            engine = %self.name,
                            fingerprint = %fingerprint,
                            transport = %transport_name,
                            attempts = total_attempts,
                            "message sent"
                        );

                        #[cfg(feature = "metrics")]
                        metrics::counter!(
                            "courier_submissions_total",
                            "engine" => self.name.clone(),
                            "outcome" => "sent"
                        )
                        .increment(1);

                        self.subscribers.publish(&CourierEvent::Sent {
                            engine: self.name.clone(),
                            timestamp: std::time::Instant::now(),
                            fingerprint: fingerprint.clone(),
                            message,
                            receipt: receipt.clone(),
                        });

                        return SubmitOutcome::Sent(receipt);
                    }
                    Err(err) => {
                        slot.breaker.record_failure();
                        let description = err.to_string();
                        self.registry.record_attempt(
                            &fingerprint,
                            AttemptRecord {
                                transport: transport_name.clone(),
                                ordinal,
                                outcome: AttemptOutcome::TransientFailure,
                                at: Utc::now(),
                            },
                            Some(&description),
                        );
                        last_error = Some(description);

                        if attempt < self.max_retries {
                            let delay =
                                backoff_delay(attempt, self.base_delay, self.max_delay);

                            #[cfg(feature = "tracing")]
                            tracing::debug!(
                                engine = %self.name,
                                fingerprint = %fingerprint,
                                transport = %transport_name,
                                attempt = ordinal,
                                delay_ms = delay.as_millis() as u64,
                                "transient failure, backing off"
                            );

                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let error =
            last_error.unwrap_or_else(|| "no delivery attempts were permitted".to_string());
        self.registry
            .mark_failed(&fingerprint, self.max_retries + 1, &error);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            engine = %self.name,
            fingerprint = %fingerprint,
            attempts = total_attempts,
            error = %error,
            "all providers exhausted"
        );

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "courier_submissions_total",
            "engine" => self.name.clone(),
            "outcome" => "failed"
        )
        .increment(1);

        self.subscribers.publish(&CourierEvent::Failed {
            engine: self.name.clone(),
            timestamp: std::time::Instant::now(),
            fingerprint: fingerprint.clone(),
            message,
            error: error.clone(),
        });

        SubmitOutcome::Failed { fingerprint, error }
    }

    /// One drain pass: admit-then-pop until the queue is empty or the
    /// limiter denies. Popping after admission is safe because this worker
    /// is the queue's only consumer.
    async fn drain_pass(&self) {
        loop {
            if self.queue.is_empty() {
                break;
            }
            if !self.limiter.try_admit() {
                break;
            }
            let Some(envelope) = self.queue.pop() else {
                break;
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(
                engine = %self.name,
                fingerprint = %envelope.fingerprint,
                "draining deferred submission"
            );

            self.dispatch(envelope.message, envelope.fingerprint).await;
        }
    }
}

async fn drain_loop(
    inner: Arc<CourierInner>,
    mut shutdown: watch::Receiver<bool>,
    cadence: Duration,
) {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.drain_pass().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Exponential backoff with proportional jitter:
/// `min(max_delay, base * 2^attempt + jitter)` where `jitter` is uniform in
/// `[0, 0.1 * base * 2^attempt)`.
fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let max_secs = max.as_secs_f64();
    let exp = base.as_secs_f64() * 2f64.powi(attempt as i32);
    if exp >= max_secs {
        return max;
    }

    let jitter = if exp > 0.0 {
        rand::rng().random_range(0.0..exp * 0.1)
    } else {
        0.0
    };
    Duration::from_secs_f64((exp + jitter).min(max_secs))
}
