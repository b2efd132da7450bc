//! FIFO of rate-denied submissions awaiting re-dispatch.

use crate::message::Message;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A deferred submission.
#[derive(Debug, Clone)]
pub(crate) struct QueuedEnvelope {
    pub(crate) message: Message,
    pub(crate) fingerprint: String,
}

/// Deferred queue shared between `submit` (tail) and the drain worker (head).
pub(crate) struct DeferredQueue {
    entries: Mutex<VecDeque<QueuedEnvelope>>,
}

impl DeferredQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, message: Message, fingerprint: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_back(QueuedEnvelope {
            message,
            fingerprint,
        });

        #[cfg(feature = "metrics")]
        metrics::gauge!("courier_queue_depth").set(entries.len() as f64);
    }

    pub(crate) fn pop(&self) -> Option<QueuedEnvelope> {
        let mut entries = self.entries.lock().unwrap();
        let envelope = entries.pop_front();

        #[cfg(feature = "metrics")]
        metrics::gauge!("courier_queue_depth").set(entries.len() as f64);

        envelope
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
