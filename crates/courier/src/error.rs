//! Error types surfaced by the engine.

use std::time::Duration;
use thiserror::Error;

/// A failure signalled by a transport adapter.
///
/// The engine treats every transport failure as transient: each one counts
/// against the provider's circuit breaker and consumes one retry slot until
/// the retry budget is exhausted. A permanent/transient taxonomy is not part
/// of the contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport reported a transient delivery failure.
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// The attempt exceeded the per-attempt upper bound.
    #[error("transport attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors returned synchronously by [`Courier::submit`](crate::Courier::submit).
///
/// Transport-layer failures are never surfaced here; they resolve to a
/// [`SubmitOutcome::Failed`](crate::SubmitOutcome::Failed) after retry and
/// fallback exhaustion. Only caller programming errors reach this type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The message is malformed.
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    /// The engine has been shut down and no longer accepts submissions.
    #[error("engine is shut down")]
    ShutDown,
}
