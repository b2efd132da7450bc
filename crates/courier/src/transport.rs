//! The transport capability and the reference mock transport.

use crate::error::TransportError;
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Record returned by a transport on successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReceipt {
    /// Transport-assigned delivery identifier.
    pub delivery_id: String,
    /// Completion timestamp.
    pub timestamp: DateTime<Utc>,
    /// Name of the transport that delivered the message.
    pub transport: String,
}

/// The attempt-delivery capability required of every provider.
///
/// Implementations either succeed with a [`TransportReceipt`] or signal a
/// transient [`TransportError`]. The `name` must be stable and unique across
/// the configured provider set; the engine keys circuit breakers and
/// snapshots by it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable name of this transport.
    fn name(&self) -> &str;

    /// Attempts delivery of a message.
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportError>;
}

/// A mock transport with tunable failure rate and latency.
///
/// Intended for tests and demos only. Each call sleeps for the configured
/// latency, then fails with the configured probability. The failure roll uses
/// a seedable RNG so tests can be made deterministic.
pub struct MockTransport {
    name: String,
    failure_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// Creates a mock transport that always succeeds with no latency.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_rate: 0.0,
            latency: Duration::ZERO,
            rng: Mutex::new(StdRng::seed_from_u64(rand::rng().random())),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the probability in `[0.0, 1.0]` that an attempt fails.
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the simulated per-attempt latency.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Seeds the failure RNG for deterministic behavior.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Returns how many times `send` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, _message: &Message) -> Result<TransportReceipt, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let roll: f64 = {
            let mut rng = self.rng.lock().unwrap();
            rng.random()
        };
        if roll < self.failure_rate {
            return Err(TransportError::Transient(format!(
                "{}: simulated delivery failure",
                self.name
            )));
        }

        Ok(TransportReceipt {
            delivery_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            transport: self.name.clone(),
        })
    }
}
