//! Provider failover demo.
//!
//! A flaky primary transport is backed by a reliable secondary. The engine
//! retries the primary with exponential backoff, opens its breaker once it
//! keeps failing, and falls through to the secondary.
//!
//! Run with: cargo run --example failover_demo

use courier::{Courier, Message, MockTransport, SubmitOutcome};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let primary = Arc::new(
        MockTransport::new("primary")
            .failure_rate(0.8)
            .latency(Duration::from_millis(20)),
    );
    let backup = Arc::new(MockTransport::new("backup").latency(Duration::from_millis(30)));

    let engine = Courier::builder()
        .name("outbound")
        .provider(Arc::clone(&primary) as Arc<dyn courier::Transport>)
        .provider(Arc::clone(&backup) as Arc<dyn courier::Transport>)
        .max_retries(1)
        .base_delay(Duration::from_millis(50))
        .breaker_threshold(3)
        .breaker_cooldown(Duration::from_secs(2))
        .rate_limit(50, Duration::from_secs(10))
        .on_sent(|fingerprint, receipt| {
            println!(
                "[sent]    {fingerprint} via {} after {} attempt(s)",
                receipt.transport, receipt.attempts
            );
        })
        .on_failed(|fingerprint, error| {
            println!("[failed]  {fingerprint}: {error}");
        })
        .on_queued(|fingerprint| {
            println!("[queued]  {fingerprint}");
        })
        .on_breaker_transition(|breaker, from, to| {
            println!("[breaker] {breaker}: {from} -> {to}");
        })
        .build();

    for n in 0..8 {
        let message = Message::new(
            "user@example.com",
            "noreply@example.com",
            format!("notification #{n}"),
            "hello from the failover demo",
        );
        match engine.submit(message).await.unwrap() {
            SubmitOutcome::Sent(_) | SubmitOutcome::Queued { .. } => {}
            SubmitOutcome::Failed { error, .. } => println!("  -> gave up: {error}"),
        }
    }

    // Replay the first message; the cached receipt is returned without
    // touching any transport.
    let replay = Message::new(
        "user@example.com",
        "noreply@example.com",
        "notification #0",
        "hello from the failover demo",
    );
    let outcome = engine.submit(replay).await.unwrap();
    println!(
        "replay resolved from cache: {}",
        outcome.receipt().map(|r| r.delivery_id.as_str()).unwrap_or("-")
    );

    let snapshot = engine.snapshot();
    println!(
        "observed={} sent={} failed={} queued={} success={}",
        snapshot.total_observed,
        snapshot.sent,
        snapshot.failed,
        snapshot.queued,
        snapshot.success_rate
    );
    for provider in &snapshot.providers {
        println!(
            "  provider {} breaker={} failures={}",
            provider.name, provider.breaker_state, provider.failure_count
        );
    }
    println!(
        "primary invoked {} time(s), backup {} time(s)",
        primary.calls(),
        backup.calls()
    );

    engine.shutdown().await;
}
