//! The outbound message accepted by the coordinator.

use crate::error::SubmitError;

/// An abstract outbound message.
///
/// A message is immutable once submitted. The engine does not validate or
/// sanitize addresses beyond rejecting empty ones; address semantics belong
/// to the transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Destination address.
    pub to: String,
    /// Origin address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Caller-supplied idempotency tag. When present it is used verbatim as
    /// the message fingerprint.
    pub idempotency_key: Option<String>,
}

impl Message {
    /// Creates a message without an idempotency tag.
    pub fn new(
        to: impl Into<String>,
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
            idempotency_key: None,
        }
    }

    /// Attaches a caller-supplied idempotency tag.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SubmitError> {
        if self.to.is_empty() {
            return Err(SubmitError::InvalidMessage("destination is empty"));
        }
        if self.from.is_empty() {
            return Err(SubmitError::InvalidMessage("origin is empty"));
        }
        Ok(())
    }
}
