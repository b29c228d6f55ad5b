//! In-memory idempotency ledger — the server side of the simulation.
//!
//! Maps request ids to submission records, decides outcomes for new ids via
//! an injected [`OutcomeDecider`], and completes delayed records on its own
//! timers. Records are created at most once per request id and never deleted
//! during the process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::types::{
    AcceptedBody, FailureBody, StatusBody, SubmissionStatus, SubmitResponse, SuccessBody,
    ACCEPTED_MESSAGE, SUCCESS_MESSAGE, TRANSIENT_ERROR,
};
use crate::simulator::{Outcome, OutcomeDecider};

/// One submission record, keyed by request id.
///
/// email/amount are immutable once set; replays answer from the stored
/// values regardless of what the duplicate request carried.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub request_id: String,
    pub email: String,
    pub amount: f64,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    fn new(request_id: &str, email: &str, amount: f64) -> Self {
        Self {
            request_id: request_id.to_string(),
            email: email.to_string(),
            amount,
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

struct LedgerInner {
    records: Mutex<HashMap<String, SubmissionRecord>>,
    decider: Box<dyn OutcomeDecider>,
}

/// Process-wide submission store. Cheaply cloneable; clones share the same
/// records, so completion tasks and concurrent callers observe one state.
///
/// A single mutex serializes every check-then-act, which makes the
/// per-request-id read-modify-write atomic: two concurrent submits with the
/// same id can never create divergent records, and a status read never
/// observes a half-applied completion.
#[derive(Clone)]
pub struct IdempotencyLedger {
    inner: Arc<LedgerInner>,
}

impl IdempotencyLedger {
    pub fn new(decider: Box<dyn OutcomeDecider>) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                records: Mutex::new(HashMap::new()),
                decider,
            }),
        }
    }

    /// Handle one submit request.
    ///
    /// - id already resolved → replay the stored success, no new simulation.
    /// - id pending → re-run the outcome decision against the same record
    ///   (a retry hitting the in-flight logical operation).
    /// - id unseen → create the record, run the simulator, apply.
    ///
    /// Duplicates never error; they normalize into idempotent responses.
    pub fn submit(&self, request_id: &str, email: &str, amount: f64) -> SubmitResponse {
        let mut records = self.inner.records.lock().expect("ledger lock poisoned");
        let record = records
            .entry(request_id.to_string())
            .or_insert_with(|| SubmissionRecord::new(request_id, email, amount));

        if record.status == SubmissionStatus::Success {
            return SubmitResponse::Success(success_body(record));
        }

        let outcome = self.inner.decider.decide();
        self.apply(record, outcome)
    }

    /// The record verbatim, or `None` for a never-seen id.
    pub fn get_status(&self, request_id: &str) -> Option<StatusBody> {
        let records = self.inner.records.lock().expect("ledger lock poisoned");
        records.get(request_id).map(|record| StatusBody {
            request_id: record.request_id.clone(),
            status: record.status,
            email: record.email.clone(),
            amount: record.amount,
            timestamp: record.completed_at,
        })
    }

    /// Number of records currently held.
    pub fn record_count(&self) -> usize {
        self.inner.records.lock().expect("ledger lock poisoned").len()
    }

    fn apply(&self, record: &mut SubmissionRecord, outcome: Outcome) -> SubmitResponse {
        match outcome {
            Outcome::ImmediateSuccess => {
                record.status = SubmissionStatus::Success;
                record.completed_at = Some(Utc::now());
                SubmitResponse::Success(success_body(record))
            }
            Outcome::TransientFailure { retry_after_seconds } => {
                SubmitResponse::TransientFailure(FailureBody {
                    error: TRANSIENT_ERROR.to_string(),
                    request_id: record.request_id.clone(),
                    retry_after_seconds,
                })
            }
            Outcome::DelayedSuccess { delay_ms } => {
                self.schedule_completion(record.request_id.clone(), delay_ms);
                SubmitResponse::Accepted(AcceptedBody {
                    message: ACCEPTED_MESSAGE.to_string(),
                    request_id: record.request_id.clone(),
                    email: record.email.clone(),
                    amount: record.amount,
                    estimated_delay_ms: delay_ms,
                })
            }
        }
    }

    /// Spawn the task that flips a delayed record to success after its
    /// estimated delay, independent of any further client polling. The flip
    /// re-checks status under the lock; a record that resolved in the
    /// meantime is left alone.
    fn schedule_completion(&self, request_id: String, delay_ms: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let mut records = inner.records.lock().expect("ledger lock poisoned");
            if let Some(record) = records.get_mut(&request_id) {
                if record.status == SubmissionStatus::Pending {
                    record.status = SubmissionStatus::Success;
                    record.completed_at = Some(Utc::now());
                }
            }
        });
    }
}

fn success_body(record: &SubmissionRecord) -> SuccessBody {
    SuccessBody {
        message: SUCCESS_MESSAGE.to_string(),
        request_id: record.request_id.clone(),
        email: record.email.clone(),
        amount: record.amount,
        timestamp: record.completed_at.unwrap_or(record.created_at),
    }
}
