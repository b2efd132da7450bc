//! Circuit breaker scenarios: tripping, fallback without probing, cooldown
//! probes, and recovery.

use async_trait::async_trait;
use chrono::Utc;
use courier::{
    BreakerState, Courier, Message, MockTransport, Transport, TransportError, TransportReceipt,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn message(subject: &str) -> Message {
    Message::new("a@x", "b@y", subject, "b")
}

/// Fails its first `fail_first` calls, then succeeds.
struct RecoveringTransport {
    name: String,
    fail_first: usize,
    calls: AtomicUsize,
}

impl RecoveringTransport {
    fn new(name: &str, fail_first: usize) -> Self {
        Self {
            name: name.to_string(),
            fail_first,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecoveringTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, _message: &Message) -> Result<TransportReceipt, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(TransportError::Transient(format!(
                "{}: warming up",
                self.name
            )));
        }
        Ok(TransportReceipt {
            delivery_id: format!("{}-{}", self.name, call),
            timestamp: Utc::now(),
            transport: self.name.clone(),
        })
    }
}

fn breaker_state(engine: &Courier, provider: &str) -> BreakerState {
    engine
        .snapshot()
        .providers
        .iter()
        .find(|p| p.name == provider)
        .unwrap()
        .breaker_state
}

#[tokio::test(start_paused = true)]
async fn tripped_breaker_falls_through_without_probing() {
    let p1 = Arc::new(
        MockTransport::new("P1")
            .failure_rate(1.0)
            .latency(Duration::from_millis(10)),
    );
    let p2 = Arc::new(MockTransport::new("P2").latency(Duration::from_millis(10)));

    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .provider(Arc::clone(&p2) as Arc<dyn courier::Transport>)
        .max_retries(5)
        .base_delay(Duration::from_millis(1))
        .breaker_threshold(3)
        .breaker_cooldown(Duration::from_millis(200))
        .build();

    // The breaker opens mid-submission after three consecutive failures; the
    // fourth attempt is refused without touching P1 and falls through to P2.
    for n in 0..3 {
        let outcome = engine.submit(message(&format!("m{n}"))).await.unwrap();
        assert_eq!(outcome.receipt().unwrap().transport, "P2");
    }
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::Open);
    assert_eq!(p1.calls(), 3);

    let p1_calls_before = p1.calls();
    let outcome = engine.submit(message("m4")).await.unwrap();
    let receipt = outcome.receipt().unwrap();
    assert_eq!(receipt.transport, "P2");
    // P1 was never invoked and its retry budget was never consumed.
    assert_eq!(p1.calls(), p1_calls_before);
    assert_eq!(receipt.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn cooldown_elapsed_permits_exactly_one_probe() {
    let p1 = Arc::new(MockTransport::new("P1").failure_rate(1.0));
    let p2 = Arc::new(MockTransport::new("P2"));

    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .provider(Arc::clone(&p2) as Arc<dyn courier::Transport>)
        .max_retries(0)
        .breaker_threshold(1)
        .breaker_cooldown(Duration::from_millis(200))
        .build();

    engine.submit(message("m1")).await.unwrap();
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::Open);
    assert_eq!(p1.calls(), 1);

    // Still cooling: refused without an invocation.
    engine.submit(message("m2")).await.unwrap();
    assert_eq!(p1.calls(), 1);

    tokio::time::advance(Duration::from_millis(201)).await;

    // Cooled down: the next submission probes P1 exactly once.
    engine.submit(message("m3")).await.unwrap();
    assert_eq!(p1.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_probe_closes_the_breaker() {
    let p1 = Arc::new(RecoveringTransport::new("P1", 2));

    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .max_retries(0)
        .breaker_threshold(2)
        .breaker_cooldown(Duration::from_millis(100))
        .build();

    // Two failing submissions trip the breaker.
    engine.submit(message("m1")).await.unwrap();
    engine.submit(message("m2")).await.unwrap();
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::Open);

    tokio::time::advance(Duration::from_millis(101)).await;

    // The transport has recovered; the probe succeeds and the circuit closes.
    let outcome = engine.submit(message("m3")).await.unwrap();
    assert!(outcome.is_sent());
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::Closed);
    assert_eq!(p1.calls(), 3);

    let outcome = engine.submit(message("m4")).await.unwrap();
    assert!(outcome.is_sent());
}

#[tokio::test(start_paused = true)]
async fn half_open_failure_streak_reopens_the_breaker() {
    let p1 = Arc::new(MockTransport::new("P1").failure_rate(1.0));

    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .max_retries(0)
        .breaker_threshold(2)
        .breaker_cooldown(Duration::from_millis(100))
        .build();

    engine.submit(message("m1")).await.unwrap();
    engine.submit(message("m2")).await.unwrap();
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::Open);

    tokio::time::advance(Duration::from_millis(101)).await;

    // First probe fails; the probe window starts a fresh streak, so the
    // breaker stays half-open until the threshold is crossed again.
    engine.submit(message("m3")).await.unwrap();
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::HalfOpen);

    engine.submit(message("m4")).await.unwrap();
    assert_eq!(breaker_state(&engine, "P1"), BreakerState::Open);
}
