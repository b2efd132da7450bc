//! Event system for the courier engine.
//!
//! Components (coordinator, circuit breakers) publish typed events through a
//! [`SubscriberSet`]. Dispatch is synchronous with respect to the publishing
//! operation; subscribers are expected to return promptly and must not block
//! forward progress indefinitely.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by engine components.
pub trait EngineEvent: Send + Sync + fmt::Debug {
    /// Returns the kind of event (e.g., "sent", "state_transition").
    fn kind(&self) -> &'static str;

    /// Returns when this event occurred.
    fn timestamp(&self) -> Instant;

    /// Returns the name of the component instance that emitted this event.
    fn source(&self) -> &str;
}

/// Trait for receiving engine events.
pub trait EventSubscriber<E: EngineEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for shared subscribers.
pub type SharedSubscriber<E> = Arc<dyn EventSubscriber<E>>;

/// An ordered collection of event subscribers.
#[derive(Clone)]
pub struct SubscriberSet<E: EngineEvent> {
    subscribers: Vec<SharedSubscriber<E>>,
}

impl<E: EngineEvent> SubscriberSet<E> {
    /// Creates a new empty subscriber set.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Adds a subscriber to the set.
    pub fn add<S>(&mut self, subscriber: S)
    where
        S: EventSubscriber<E> + 'static,
    {
        self.subscribers.push(Arc::new(subscriber));
    }

    /// Removes every subscriber from the set.
    ///
    /// Subscriber storage is bounded by registration, not by traffic, so the
    /// engine never grows this set on its own; `clear` exists so embedders
    /// can drop subscriptions without rebuilding the owning component.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Publishes an event to all registered subscribers.
    ///
    /// If a subscriber panics, the panic is caught and the remaining
    /// subscribers are still invoked, so one misbehaving subscriber cannot
    /// starve the others. With the optional `tracing` feature, panicking
    /// subscribers are logged as warnings; with the `metrics` feature a
    /// counter is incremented.
    pub fn publish(&self, event: &E) {
        for (index, subscriber) in self.subscribers.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                subscriber.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_subscriber_panic(index, event, _panic_payload.as_ref());

                #[cfg(feature = "metrics")]
                record_subscriber_panic_metric(event);

                #[cfg(not(feature = "tracing"))]
                let _ = index;

                #[cfg(not(any(feature = "tracing", feature = "metrics")))]
                let _ = _panic_payload;
            }
        }
    }

    /// Returns true if there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Returns the number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: EngineEvent> Default for SubscriberSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A function-based event subscriber.
pub struct FnSubscriber<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<E>,
}

impl<E, F> FnSubscriber<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Creates a new function-based subscriber.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventSubscriber<E> for FnSubscriber<E, F>
where
    E: EngineEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

#[cfg(feature = "tracing")]
fn log_subscriber_panic<E: EngineEvent>(
    index: usize,
    event: &E,
    panic_payload: &(dyn Any + Send),
) {
    let panic_message = panic_payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic_payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::warn!(
        subscriber_index = index,
        source = event.source(),
        kind = event.kind(),
        panic_message = %panic_message,
        "event subscriber panicked"
    );
}

#[cfg(feature = "metrics")]
fn record_subscriber_panic_metric<E: EngineEvent>(event: &E) {
    metrics::counter!(
        "courier_event_subscriber_panics_total",
        "source" => event.source().to_string(),
        "kind" => event.kind().to_string()
    )
    .increment(1);
}
