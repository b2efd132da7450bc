//! Idempotency cache and per-fingerprint status table.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Terminal record of a successful delivery, cached for the engine lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Fingerprint of the delivered message.
    pub fingerprint: String,
    /// Transport-assigned delivery identifier.
    pub delivery_id: String,
    /// Name of the transport that delivered the message.
    pub transport: String,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
    /// Total transport invocations spent on this submission.
    pub attempts: u32,
}

/// Current dispatch state of a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Admitted, first attempt not yet resolved.
    Pending,
    /// A previous attempt failed; another is in progress or scheduled.
    Retrying,
    /// Rate-denied and parked in the deferred queue.
    Queued,
    /// Delivered. Terminal for the submission cycle.
    Sent,
    /// Every provider exhausted. Terminal for the submission cycle.
    Failed,
}

impl DispatchState {
    /// Stable lowercase label, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Pending => "pending",
            DispatchState::Retrying => "retrying",
            DispatchState::Queued => "queued",
            DispatchState::Sent => "sent",
            DispatchState::Failed => "failed",
        }
    }

    /// True for `Sent` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Sent | DispatchState::Failed)
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single transport invocation (or breaker refusal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The transport accepted the message.
    Delivered,
    /// The transport signalled a transient failure.
    TransientFailure,
    /// The provider's breaker refused the call without invoking it.
    BreakerOpen,
}

/// One entry in a submission cycle's attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Transport the attempt was routed to.
    pub transport: String,
    /// 1-based attempt ordinal within that transport.
    pub ordinal: u32,
    /// How the attempt resolved.
    pub outcome: AttemptOutcome,
    /// When the attempt resolved.
    pub at: DateTime<Utc>,
}

/// Status snapshot for a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStatus {
    /// Current state.
    pub state: DispatchState,
    /// Attempts observed so far against the current transport.
    pub attempts: u32,
    /// Transport currently (or last) attempted.
    pub transport: Option<String>,
    /// Description of the most recent transient error.
    pub last_error: Option<String>,
    /// When this record last changed.
    pub updated_at: DateTime<Utc>,
    /// Attempt history for the current submission cycle.
    pub history: Vec<AttemptRecord>,
}

impl DispatchStatus {
    fn fresh(state: DispatchState) -> Self {
        Self {
            state,
            attempts: 0,
            transport: None,
            last_error: None,
            updated_at: Utc::now(),
            history: Vec::new(),
        }
    }
}

/// Aggregate counts over the status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StatusCounts {
    pub(crate) total: usize,
    pub(crate) sent: usize,
    pub(crate) failed: usize,
    pub(crate) queued: usize,
}

/// The two fingerprint-keyed stores: the append-only success cache and the
/// overwrite-in-place status table. Readers always get a cloned snapshot, so
/// a concurrent writer can never expose a torn record.
pub(crate) struct ResultRegistry {
    receipts: Mutex<HashMap<String, DeliveryReceipt>>,
    statuses: Mutex<HashMap<String, DispatchStatus>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResultRegistry {
    pub(crate) fn new() -> Self {
        Self {
            receipts: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn cached_receipt(&self, fingerprint: &str) -> Option<DeliveryReceipt> {
        self.receipts.lock().unwrap().get(fingerprint).cloned()
    }

    pub(crate) fn store_receipt(&self, receipt: DeliveryReceipt) {
        self.receipts
            .lock()
            .unwrap()
            .entry(receipt.fingerprint.clone())
            .or_insert(receipt);
    }

    /// Per-fingerprint dispatch gate: at most one dispatch runs per
    /// fingerprint at a time. Entries live as long as the status table does.
    pub(crate) fn dispatch_gate(&self, fingerprint: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap();
        Arc::clone(
            gates
                .entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    pub(crate) fn status(&self, fingerprint: &str) -> Option<DispatchStatus> {
        self.statuses.lock().unwrap().get(fingerprint).cloned()
    }

    /// Parks a fingerprint as `Queued`, starting (or restarting) a cycle.
    pub(crate) fn mark_queued(&self, fingerprint: &str) {
        let mut statuses = self.statuses.lock().unwrap();
        statuses.insert(
            fingerprint.to_string(),
            DispatchStatus::fresh(DispatchState::Queued),
        );
    }

    /// Starts a submission cycle in `Pending` with a clean history.
    pub(crate) fn begin_cycle(&self, fingerprint: &str) {
        let mut statuses = self.statuses.lock().unwrap();
        statuses.insert(
            fingerprint.to_string(),
            DispatchStatus::fresh(DispatchState::Pending),
        );
    }

    /// Records the start of one attempt. The very first attempt of a cycle
    /// stays `Pending`; every later attempt start is `Retrying`, so observed
    /// states never move backwards within a cycle.
    pub(crate) fn begin_attempt(
        &self,
        fingerprint: &str,
        transport: &str,
        ordinal: u32,
        first_of_cycle: bool,
    ) {
        let mut statuses = self.statuses.lock().unwrap();
        if let Some(status) = statuses.get_mut(fingerprint) {
            if status.state.is_terminal() {
                return;
            }
            status.state = if first_of_cycle {
                DispatchState::Pending
            } else {
                DispatchState::Retrying
            };
            status.attempts = ordinal;
            status.transport = Some(transport.to_string());
            status.updated_at = Utc::now();
        }
    }

    /// Appends an attempt record, tracking the latest transient error.
    pub(crate) fn record_attempt(
        &self,
        fingerprint: &str,
        record: AttemptRecord,
        error: Option<&str>,
    ) {
        let mut statuses = self.statuses.lock().unwrap();
        if let Some(status) = statuses.get_mut(fingerprint) {
            if let Some(error) = error {
                status.last_error = Some(error.to_string());
            }
            status.history.push(record);
            status.updated_at = Utc::now();
        }
    }

    pub(crate) fn mark_sent(&self, fingerprint: &str, transport: &str, attempts: u32) {
        let mut statuses = self.statuses.lock().unwrap();
        if let Some(status) = statuses.get_mut(fingerprint) {
            if status.state.is_terminal() {
                return;
            }
            status.state = DispatchState::Sent;
            status.attempts = attempts;
            status.transport = Some(transport.to_string());
            status.updated_at = Utc::now();
        }
    }

    pub(crate) fn mark_failed(&self, fingerprint: &str, attempts: u32, error: &str) {
        let mut statuses = self.statuses.lock().unwrap();
        if let Some(status) = statuses.get_mut(fingerprint) {
            if status.state.is_terminal() {
                return;
            }
            status.state = DispatchState::Failed;
            status.attempts = attempts;
            status.last_error = Some(error.to_string());
            status.updated_at = Utc::now();
        }
    }

    pub(crate) fn counts(&self) -> StatusCounts {
        let statuses = self.statuses.lock().unwrap();
        let mut counts = StatusCounts {
            total: statuses.len(),
            sent: 0,
            failed: 0,
            queued: 0,
        };
        for status in statuses.values() {
            match status.state {
                DispatchState::Sent => counts.sent += 1,
                DispatchState::Failed => counts.failed += 1,
                DispatchState::Queued => counts.queued += 1,
                DispatchState::Pending | DispatchState::Retrying => {}
            }
        }
        counts
    }
}
