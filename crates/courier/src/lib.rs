//! Resilient send coordination for outbound messages.
//!
//! `courier` accepts abstract messages and guarantees each unique message is
//! handed to at most one of several interchangeable transports, with bounded
//! retry, ordered provider fallback, per-provider circuit breaking,
//! sliding-window rate limiting, deferred queueing, and idempotent result
//! caching.
//!
//! ## Basic Example
//!
//! ```rust
//! use courier::{Courier, Message, MockTransport, SubmitOutcome};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let engine = Courier::builder()
//!     .name("outbound")
//!     .provider(Arc::new(MockTransport::new("primary")))
//!     .build();
//!
//! let message = Message::new("a@example.com", "noreply@example.com", "hi", "body");
//! match engine.submit(message).await.unwrap() {
//!     SubmitOutcome::Sent(receipt) => println!("delivered as {}", receipt.delivery_id),
//!     SubmitOutcome::Queued { fingerprint } => println!("deferred: {fingerprint}"),
//!     SubmitOutcome::Failed { error, .. } => println!("exhausted: {error}"),
//! }
//! # }
//! ```
//!
//! ## Provider Fallback
//!
//! Providers are tried in configuration order. Each gets `max_retries + 1`
//! attempts with exponential backoff; an open circuit breaker skips a
//! provider without consuming its retry budget.
//!
//! ```rust
//! use courier::{Courier, MockTransport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let engine = Courier::builder()
//!     .provider(Arc::new(MockTransport::new("flaky").failure_rate(0.3)))
//!     .provider(Arc::new(MockTransport::new("backup")))
//!     .max_retries(2)
//!     .base_delay(Duration::from_millis(100))
//!     .breaker_threshold(5)
//!     .build();
//! # }
//! ```
//!
//! ## Events
//!
//! The engine publishes `sent`, `failed`, and `queued` events; callbacks are
//! registered on the builder:
//!
//! ```rust
//! use courier::{Courier, MockTransport};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let engine = Courier::builder()
//!     .provider(Arc::new(MockTransport::new("primary")))
//!     .on_sent(|fingerprint, receipt| {
//!         println!("{fingerprint} delivered via {}", receipt.transport);
//!     })
//!     .on_failed(|fingerprint, error| {
//!         eprintln!("{fingerprint} failed: {error}");
//!     })
//!     .on_queued(|fingerprint| {
//!         println!("{fingerprint} deferred");
//!     })
//!     .build();
//! # }
//! ```
//!
//! Custom transports implement the [`Transport`] capability; anything with a
//! stable name and an attempt-delivery operation plugs in.

mod breaker;
mod config;
mod coordinator;
mod error;
mod events;
mod fingerprint;
mod limiter;
mod message;
mod queue;
mod registry;
mod transport;

pub use breaker::{BreakerSettings, BreakerState};
pub use config::{CourierConfig, CourierConfigBuilder};
pub use coordinator::{Courier, EngineSnapshot, ProviderSnapshot, SubmitOutcome};
pub use error::{SubmitError, TransportError};
pub use events::{BreakerEvent, CourierEvent};
pub use fingerprint::fingerprint;
pub use limiter::RateLimitSettings;
pub use message::Message;
pub use registry::{AttemptOutcome, AttemptRecord, DeliveryReceipt, DispatchState, DispatchStatus};
pub use transport::{MockTransport, Transport, TransportReceipt};
