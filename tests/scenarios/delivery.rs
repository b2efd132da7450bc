//! Delivery scenarios: happy path, fallback, exhaustion, idempotent replay.

use courier::{Courier, DispatchState, Message, MockTransport, SubmitOutcome};
use std::sync::Arc;
use std::time::Duration;

fn message(subject: &str) -> Message {
    Message::new("a@x", "b@y", subject, "b")
}

#[tokio::test(start_paused = true)]
async fn happy_path_single_provider() {
    let p1 = Arc::new(MockTransport::new("P1").latency(Duration::from_millis(10)));
    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .build();

    let outcome = engine.submit(message("s")).await.unwrap();
    let receipt = outcome.receipt().expect("expected SENT");
    assert_eq!(receipt.transport, "P1");
    assert_eq!(receipt.attempts, 1);

    let status = engine.status(&receipt.fingerprint).unwrap();
    assert_eq!(status.state, DispatchState::Sent);
    assert_eq!(status.attempts, 1);
    assert_eq!(p1.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_primary_falls_back_to_secondary() {
    let bad = Arc::new(
        MockTransport::new("Bad")
            .failure_rate(1.0)
            .latency(Duration::from_millis(10)),
    );
    let good = Arc::new(MockTransport::new("Good").latency(Duration::from_millis(10)));

    let engine = Courier::builder()
        .provider(Arc::clone(&bad) as Arc<dyn courier::Transport>)
        .provider(Arc::clone(&good) as Arc<dyn courier::Transport>)
        .max_retries(1)
        .base_delay(Duration::from_millis(1))
        .build();

    let outcome = engine.submit(message("s")).await.unwrap();
    let receipt = outcome.receipt().expect("expected SENT");
    assert_eq!(receipt.transport, "Good");

    // Full retry budget on the primary, first attempt on the secondary.
    assert_eq!(bad.calls(), 2);
    assert_eq!(good.calls(), 1);
    assert_eq!(receipt.attempts, 3);

    let status = engine.status(&receipt.fingerprint).unwrap();
    assert_eq!(status.state, DispatchState::Sent);
    assert_eq!(status.transport.as_deref(), Some("Good"));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_resolves_to_failed() {
    let bad = Arc::new(
        MockTransport::new("Bad")
            .failure_rate(1.0)
            .latency(Duration::from_millis(10)),
    );
    let engine = Courier::builder()
        .provider(Arc::clone(&bad) as Arc<dyn courier::Transport>)
        .max_retries(0)
        .build();

    let outcome = engine.submit(message("s")).await.unwrap();
    let fingerprint = match outcome {
        SubmitOutcome::Failed { fingerprint, error } => {
            assert!(error.contains("Bad"));
            fingerprint
        }
        other => panic!("expected FAILED, got {other:?}"),
    };
    assert_eq!(bad.calls(), 1);

    let status = engine.status(&fingerprint).unwrap();
    assert_eq!(status.state, DispatchState::Failed);
    assert_eq!(status.attempts, 1);
    assert!(status.last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn replay_returns_cached_receipt_without_resending() {
    let p1 = Arc::new(MockTransport::new("P1").latency(Duration::from_millis(10)));
    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .build();

    let first = engine.submit(message("s")).await.unwrap();
    let second = engine.submit(message("s")).await.unwrap();

    let first = first.receipt().unwrap();
    let second = second.receipt().unwrap();
    assert_eq!(first.delivery_id, second.delivery_id);
    assert_eq!(first, second);
    assert_eq!(p1.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn idempotency_key_overrides_content_fingerprint() {
    let p1 = Arc::new(MockTransport::new("P1"));
    let engine = Courier::builder()
        .provider(Arc::clone(&p1) as Arc<dyn courier::Transport>)
        .build();

    // Different content, same caller-supplied tag: second submission replays.
    let a = message("one").with_idempotency_key("job-7");
    let b = message("two").with_idempotency_key("job-7");

    let first = engine.submit(a).await.unwrap();
    let second = engine.submit(b).await.unwrap();
    assert_eq!(
        first.receipt().unwrap().delivery_id,
        second.receipt().unwrap().delivery_id
    );
    assert_eq!(p1.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_fingerprint_can_be_resubmitted() {
    let flaky = Arc::new(MockTransport::new("P1").failure_rate(1.0));
    let engine = Courier::builder()
        .provider(Arc::clone(&flaky) as Arc<dyn courier::Transport>)
        .max_retries(0)
        .build();

    let outcome = engine.submit(message("s")).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));

    // A new cycle starts for the same fingerprint; nothing is cached for it.
    let outcome = engine.submit(message("s")).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
    assert_eq!(flaky.calls(), 2);
}
