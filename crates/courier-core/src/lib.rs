//! Core infrastructure for the courier engine.
//!
//! This crate provides the event plumbing shared by the engine's components:
//! a small trait describing emitted events, a subscriber registry with
//! panic-isolated synchronous dispatch, and a closure adapter for quick
//! callback-style subscriptions.

pub mod events;

pub use events::{EngineEvent, EventSubscriber, FnSubscriber, SubscriberSet};
