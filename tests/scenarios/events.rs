//! Event emission contracts: kinds, cardinality, and ordering.

use courier::{Courier, CourierEvent, Message, MockTransport};
use courier_core::{EngineEvent, FnSubscriber};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn message(subject: &str) -> Message {
    Message::new("a@x", "b@y", subject, "b")
}

struct EventCounters {
    sent: AtomicUsize,
    failed: AtomicUsize,
    queued: AtomicUsize,
}

impl EventCounters {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        })
    }
}

fn counting_engine(
    transport: Arc<MockTransport>,
    counters: &Arc<EventCounters>,
    max_retries: u32,
) -> Courier {
    let sent = Arc::clone(counters);
    let failed = Arc::clone(counters);
    let queued = Arc::clone(counters);
    Courier::builder()
        .provider(transport as Arc<dyn courier::Transport>)
        .max_retries(max_retries)
        .base_delay(Duration::from_millis(1))
        .on_sent(move |_, _| {
            sent.sent.fetch_add(1, Ordering::SeqCst);
        })
        .on_failed(move |_, _| {
            failed.failed.fetch_add(1, Ordering::SeqCst);
        })
        .on_queued(move |_| {
            queued.queued.fetch_add(1, Ordering::SeqCst);
        })
        .build()
}

#[tokio::test(start_paused = true)]
async fn sent_emitted_once_and_cache_hits_are_silent() {
    let counters = EventCounters::new();
    let engine = counting_engine(Arc::new(MockTransport::new("P1")), &counters, 0);

    engine.submit(message("s")).await.unwrap();
    assert_eq!(counters.sent.load(Ordering::SeqCst), 1);

    // Replay: no transport attempt, no event.
    engine.submit(message("s")).await.unwrap();
    assert_eq!(counters.sent.load(Ordering::SeqCst), 1);
    assert_eq!(counters.failed.load(Ordering::SeqCst), 0);
    assert_eq!(counters.queued.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_emitted_exactly_once_on_exhaustion() {
    let counters = EventCounters::new();
    let engine = counting_engine(
        Arc::new(MockTransport::new("Bad").failure_rate(1.0)),
        &counters,
        2,
    );

    engine.submit(message("s")).await.unwrap();
    assert_eq!(counters.failed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn queued_then_sent_are_emitted_in_order() {
    let log: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let queued_log = Arc::clone(&log);
    let sent_log = Arc::clone(&log);

    let engine = Courier::builder()
        .provider(Arc::new(MockTransport::new("P1")))
        .rate_limit(1, Duration::from_millis(500))
        .on_queued(move |fingerprint| {
            queued_log
                .lock()
                .unwrap()
                .push(("queued".into(), fingerprint.to_string()));
        })
        .on_sent(move |fingerprint, _| {
            sent_log
                .lock()
                .unwrap()
                .push(("sent".into(), fingerprint.to_string()));
        })
        .build();

    engine.submit(message("m1")).await.unwrap();
    let deferred = engine.submit(message("m2")).await.unwrap();
    let fingerprint = match deferred {
        courier::SubmitOutcome::Queued { fingerprint } => fingerprint,
        other => panic!("expected QUEUED, got {other:?}"),
    };

    tokio::time::sleep(Duration::from_secs(2)).await;

    let log = log.lock().unwrap();
    let for_deferred: Vec<&str> = log
        .iter()
        .filter(|(_, fp)| *fp == fingerprint)
        .map(|(kind, _)| kind.as_str())
        .collect();
    assert_eq!(for_deferred, ["queued", "sent"]);
}

#[tokio::test(start_paused = true)]
async fn panicking_subscriber_does_not_break_delivery() {
    let counters = EventCounters::new();
    let sent = Arc::clone(&counters);

    let engine = Courier::builder()
        .provider(Arc::new(MockTransport::new("P1")))
        .on_sent(|_, _| panic!("subscriber bug"))
        .on_sent(move |_, _| {
            sent.sent.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let outcome = engine.submit(message("s")).await.unwrap();
    assert!(outcome.is_sent());
    assert_eq!(counters.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn raw_subscriber_sees_every_event_kind() {
    let kinds: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let kinds_clone = Arc::clone(&kinds);

    let engine = Courier::builder()
        .provider(Arc::new(MockTransport::new("P1")))
        .rate_limit(1, Duration::from_millis(60_000))
        .subscribe(FnSubscriber::new(move |event: &CourierEvent| {
            kinds_clone.lock().unwrap().push(event.kind());
        }))
        .build();

    engine.submit(message("m1")).await.unwrap();
    engine.submit(message("m2")).await.unwrap();

    assert_eq!(*kinds.lock().unwrap(), ["sent", "queued"]);
}

#[tokio::test(start_paused = true)]
async fn breaker_transition_callbacks_fire() {
    let transitions: Arc<Mutex<Vec<(String, String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let transitions_clone = Arc::clone(&transitions);

    let engine = Courier::builder()
        .provider(Arc::new(MockTransport::new("Bad").failure_rate(1.0)))
        .max_retries(3)
        .base_delay(Duration::from_millis(1))
        .breaker_threshold(2)
        .on_breaker_transition(move |breaker, from, to| {
            transitions_clone.lock().unwrap().push((
                breaker.to_string(),
                from.to_string(),
                to.to_string(),
            ));
        })
        .build();

    engine.submit(message("s")).await.unwrap();

    let transitions = transitions.lock().unwrap();
    assert_eq!(
        transitions.first(),
        Some(&("Bad".to_string(), "closed".to_string(), "open".to_string()))
    );
}
