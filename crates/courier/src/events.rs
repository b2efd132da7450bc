//! Events emitted by the engine.

use crate::breaker::BreakerState;
use crate::message::Message;
use crate::registry::DeliveryReceipt;
use courier_core::EngineEvent;
use std::time::Instant;

/// Terminal and queueing events emitted by the coordinator.
///
/// Per submission the engine publishes at most one `Queued` and, unless the
/// submission was a cache hit, exactly one of `Sent`/`Failed`. Cache hits
/// publish nothing.
#[derive(Debug, Clone)]
pub enum CourierEvent {
    /// A message was delivered through a transport.
    Sent {
        /// Name of the engine instance.
        engine: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Fingerprint of the delivered message.
        fingerprint: String,
        /// The submitted message.
        message: Message,
        /// The cached delivery receipt.
        receipt: DeliveryReceipt,
    },

    /// Every provider was exhausted without a successful delivery.
    Failed {
        /// Name of the engine instance.
        engine: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Fingerprint of the failed message.
        fingerprint: String,
        /// The submitted message.
        message: Message,
        /// Description of the last transient error.
        error: String,
    },

    /// Admission was rate-denied and the message was deferred.
    Queued {
        /// Name of the engine instance.
        engine: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Fingerprint of the deferred message.
        fingerprint: String,
        /// The submitted message.
        message: Message,
    },
}

impl EngineEvent for CourierEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Failed { .. } => "failed",
            Self::Queued { .. } => "queued",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Sent { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Queued { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::Sent { engine, .. }
            | Self::Failed { engine, .. }
            | Self::Queued { engine, .. } => engine,
        }
    }
}

/// Events emitted by a per-provider circuit breaker.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        /// Name of the guarded transport.
        breaker: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State before the transition.
        from: BreakerState,
        /// State after the transition.
        to: BreakerState,
    },

    /// A call was refused because the breaker is open.
    CallRejected {
        /// Name of the guarded transport.
        breaker: String,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl EngineEvent for BreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::CallRejected { .. } => "call_rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { timestamp, .. } | Self::CallRejected { timestamp, .. } => {
                *timestamp
            }
        }
    }

    fn source(&self) -> &str {
        match self {
            Self::StateTransition { breaker, .. } | Self::CallRejected { breaker, .. } => breaker,
        }
    }
}
