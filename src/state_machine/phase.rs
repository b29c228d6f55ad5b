use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gateway::types::{StatusBody, SubmissionStatus, SubmitResponse, SuccessBody, SUCCESS_MESSAGE};

use super::submission::RetryConfig;

/// The four phases of the submission controller.
///
/// A submission flows through: IDLE → PENDING → {SUCCESS | ERROR}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Pending,
    Success,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::Pending => write!(f, "PENDING"),
            Phase::Success => write!(f, "SUCCESS"),
            Phase::Error => write!(f, "ERROR"),
        }
    }
}

/// Client-side view of one submission lifecycle.
///
/// Exactly one request id is active at a time; a new id is minted only when
/// a new logical submission starts from `Idle`, never on retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerState {
    pub phase: Phase,
    pub current_request_id: Option<String>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            current_request_id: None,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Single-flight guard: claims the controller for a new submission.
    ///
    /// Returns `false` without touching any field when a submission is
    /// already in progress (or a terminal phase has not been reset).
    pub fn begin(&mut self, request_id: String) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Pending;
        self.current_request_id = Some(request_id);
        self.retry_count = 0;
        self.last_error = None;
        true
    }

    /// Whether `request_id` is still the active submission. Timer wakes
    /// check this before acting so a stale timer is a no-op.
    pub fn is_current(&self, request_id: &str) -> bool {
        self.current_request_id.as_deref() == Some(request_id)
    }

    /// Terminal failure: records the reason and moves to `Error`.
    pub fn fail(&mut self, reason: String) {
        self.phase = Phase::Error;
        self.last_error = Some(reason);
    }

    /// Returns to `Idle` from a terminal phase. Invalid from `Idle` or
    /// `Pending` and returns `false` without touching any field.
    pub fn reset(&mut self) -> bool {
        match self.phase {
            Phase::Success | Phase::Error => {
                self.phase = Phase::Idle;
                self.current_request_id = None;
                self.retry_count = 0;
                self.last_error = None;
                true
            }
            _ => false,
        }
    }

    /// Abandons an in-flight submission: `Pending` → `Idle`.
    ///
    /// Clears the active request id, so any outstanding backoff or poll
    /// timer that captured the old id finds it stale when it fires.
    pub fn cancel(&mut self) -> bool {
        if self.phase != Phase::Pending {
            return false;
        }
        self.phase = Phase::Idle;
        self.current_request_id = None;
        self.retry_count = 0;
        self.last_error = None;
        true
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the controller observed for one dispatch of the request.
#[derive(Debug, Clone)]
pub enum SubmitEvent {
    /// The gateway answered with one of the protocol bodies.
    Response(SubmitResponse),
    /// The channel itself failed (no response). Counts against the same
    /// retry budget as a transient failure.
    ChannelDown(String),
}

/// The decision computed from one event.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// Terminal success; carries the final payload.
    Finalize(SuccessBody),
    /// Accepted/delayed: stay pending and query status after the delay.
    Poll { delay_ms: u64 },
    /// Retry the same request id after an exponential backoff delay.
    Backoff {
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    /// Retry budget exhausted; the submission is terminally failed.
    GiveUp { reason: String },
}

/// Pure transition logic for the submission controller.
pub struct SubmissionMachine;

impl SubmissionMachine {
    /// Compute the next step for an in-flight submission and apply it to
    /// the state.
    ///
    /// - Success response → `Success` phase, done.
    /// - Accepted response → phase stays `Pending`, poll after the
    ///   server-provided estimated delay.
    /// - Transient failure or channel failure → retry with backoff while
    ///   retries remain, otherwise move to `Error`.
    pub fn next(state: &mut ControllerState, retry: &RetryConfig, event: SubmitEvent) -> NextStep {
        match event {
            SubmitEvent::Response(SubmitResponse::Success(body)) => {
                state.phase = Phase::Success;
                NextStep::Finalize(body)
            }
            SubmitEvent::Response(SubmitResponse::Accepted(body)) => NextStep::Poll {
                delay_ms: body.estimated_delay_ms,
            },
            SubmitEvent::Response(SubmitResponse::TransientFailure(body)) => {
                Self::handle_failure(state, retry, body.error)
            }
            SubmitEvent::ChannelDown(reason) => Self::handle_failure(state, retry, reason),
        }
    }

    /// Interpret a status poll answer. Returns the synthesized success
    /// payload once the record has resolved, `None` while it is pending.
    pub fn poll_result(state: &mut ControllerState, body: StatusBody) -> Option<SuccessBody> {
        match body.status {
            SubmissionStatus::Success => {
                state.phase = Phase::Success;
                Some(SuccessBody {
                    message: SUCCESS_MESSAGE.to_string(),
                    request_id: body.request_id,
                    email: body.email,
                    amount: body.amount,
                    timestamp: body.timestamp.unwrap_or_else(chrono::Utc::now),
                })
            }
            SubmissionStatus::Pending => None,
        }
    }

    // retry_count stays within [0, max_retries]: it only advances while
    // retries remain, so a failure at the cap moves to Error instead.
    fn handle_failure(state: &mut ControllerState, retry: &RetryConfig, reason: String) -> NextStep {
        if state.retry_count < retry.max_retries {
            state.retry_count += 1;
            NextStep::Backoff {
                attempt: state.retry_count,
                delay_ms: retry.delay_for_attempt(state.retry_count),
                reason,
            }
        } else {
            state.fail(reason.clone());
            NextStep::GiveUp { reason }
        }
    }
}
