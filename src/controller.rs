use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;

use crate::error::PaysimError;
use crate::gateway::types::{StatusResponse, SubmitRequest, SuccessBody};
use crate::gateway::SubmitChannel;
use crate::state_machine::{
    mint_request_id, ControllerState, NextStep, RetryConfig, SubmissionMachine, SubmissionReceipt,
    SubmitEvent,
};

/// Drives one submission at a time through its full lifecycle.
///
/// The controller owns its [`ControllerState`] exclusively; the gateway owns
/// the records. They meet only through the channel. Backoff and poll waits
/// are plain timer suspensions; every wake re-checks that the captured
/// request id is still the active one, so waits that outlive a cancel are
/// no-ops.
pub struct SubmissionController<C: SubmitChannel> {
    channel: C,
    retry: RetryConfig,
    state: Arc<Mutex<ControllerState>>,
}

/// How a poll loop ended, other than terminally.
enum PollOutcome {
    Receipt(SubmissionReceipt),
    /// The submission was cancelled while waiting.
    Stale,
    /// A budget-counted channel failure; re-dispatch the submit.
    RetrySubmit,
}

impl<C: SubmitChannel> SubmissionController<C> {
    pub fn new(channel: C, retry: RetryConfig) -> Self {
        Self {
            channel,
            retry,
            state: Arc::new(Mutex::new(ControllerState::new())),
        }
    }

    /// Run one logical submission to a terminal phase.
    ///
    /// Returns `Ok(None)` without touching any state when another submission
    /// is already in flight (single-flight guard) or when the submission was
    /// cancelled mid-wait. Invalid input is terminal and never dispatched.
    pub async fn submit(
        &self,
        email: &str,
        amount: f64,
    ) -> Result<Option<SubmissionReceipt>, PaysimError> {
        validate_input(email, amount)?;

        let request_id = mint_request_id(email);
        if !self.lock_state().begin(request_id.clone()) {
            return Ok(None);
        }
        let started_at = Utc::now();
        let req = SubmitRequest {
            request_id: request_id.clone(),
            email: email.to_string(),
            amount,
        };

        loop {
            let event = match self.channel.submit(&req).await {
                Ok(response) => SubmitEvent::Response(response),
                Err(err) => SubmitEvent::ChannelDown(err.to_string()),
            };

            let step = {
                let mut state = self.lock_state();
                if !state.is_current(&request_id) {
                    return Ok(None);
                }
                SubmissionMachine::next(&mut state, &self.retry, event)
            };

            match step {
                NextStep::Finalize(body) => {
                    return Ok(Some(self.receipt(&body, started_at)));
                }
                NextStep::Backoff {
                    attempt,
                    delay_ms,
                    reason,
                } => {
                    log_retry(attempt, self.retry.max_retries, &reason, delay_ms);
                    sleep(Duration::from_millis(delay_ms)).await;
                    if !self.is_current(&request_id) {
                        return Ok(None);
                    }
                }
                NextStep::Poll { delay_ms } => {
                    match self.poll_until_resolved(&request_id, delay_ms, started_at).await? {
                        PollOutcome::Receipt(receipt) => return Ok(Some(receipt)),
                        PollOutcome::Stale => return Ok(None),
                        PollOutcome::RetrySubmit => {}
                    }
                }
                NextStep::GiveUp { reason } => {
                    return Err(PaysimError::ExhaustedRetries {
                        attempts: self.retry.max_retries,
                        last_error: reason,
                    });
                }
            }
        }
    }

    /// Returns to `Idle` from `Success` or `Error`. No-op otherwise.
    pub fn reset(&self) -> bool {
        self.lock_state().reset()
    }

    /// Abandons an in-flight submission; any outstanding timer wake for it
    /// becomes stale. No-op unless `Pending`.
    pub fn cancel(&self) -> bool {
        self.lock_state().cancel()
    }

    /// A copy of the current controller state.
    pub fn snapshot(&self) -> ControllerState {
        self.lock_state().clone()
    }

    /// Wait the accepted delay, then query status on a fixed interval until
    /// the record resolves. A failed poll counts against the retry budget
    /// like any other channel failure.
    async fn poll_until_resolved(
        &self,
        request_id: &str,
        initial_delay_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Result<PollOutcome, PaysimError> {
        log_accepted(initial_delay_ms);
        sleep(Duration::from_millis(initial_delay_ms)).await;

        loop {
            if !self.is_current(request_id) {
                return Ok(PollOutcome::Stale);
            }

            match self.channel.status(request_id).await {
                Ok(StatusResponse::Found(body)) => {
                    let resolved = {
                        let mut state = self.lock_state();
                        if !state.is_current(request_id) {
                            return Ok(PollOutcome::Stale);
                        }
                        SubmissionMachine::poll_result(&mut state, body)
                    };
                    match resolved {
                        Some(success) => {
                            return Ok(PollOutcome::Receipt(self.receipt(&success, started_at)));
                        }
                        None => sleep(Duration::from_millis(self.retry.poll_interval_ms)).await,
                    }
                }
                Ok(StatusResponse::NotFound { .. }) => {
                    self.lock_state()
                        .fail(format!("unknown request id: {request_id}"));
                    return Err(PaysimError::UnknownRequestId(request_id.to_string()));
                }
                Err(err) => {
                    let step = {
                        let mut state = self.lock_state();
                        if !state.is_current(request_id) {
                            return Ok(PollOutcome::Stale);
                        }
                        SubmissionMachine::next(
                            &mut state,
                            &self.retry,
                            SubmitEvent::ChannelDown(err.to_string()),
                        )
                    };
                    match step {
                        NextStep::Backoff {
                            attempt,
                            delay_ms,
                            reason,
                        } => {
                            log_retry(attempt, self.retry.max_retries, &reason, delay_ms);
                            sleep(Duration::from_millis(delay_ms)).await;
                            if !self.is_current(request_id) {
                                return Ok(PollOutcome::Stale);
                            }
                            return Ok(PollOutcome::RetrySubmit);
                        }
                        NextStep::GiveUp { reason } => {
                            return Err(PaysimError::ExhaustedRetries {
                                attempts: self.retry.max_retries,
                                last_error: reason,
                            });
                        }
                        _ => unreachable!("channel failure maps to backoff or give-up"),
                    }
                }
            }
        }
    }

    fn receipt(&self, body: &SuccessBody, started_at: DateTime<Utc>) -> SubmissionReceipt {
        let retries = self.lock_state().retry_count;
        SubmissionReceipt::from_success(body, retries, started_at)
    }

    fn is_current(&self, request_id: &str) -> bool {
        self.lock_state().is_current(request_id)
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().expect("controller lock poisoned")
    }
}

/// Input validation runs before any dispatch; failures here are terminal
/// and never consume a request id on the wire.
fn validate_input(email: &str, amount: f64) -> Result<(), PaysimError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => {
            return Err(PaysimError::InvalidInput(format!(
                "malformed email: {email}"
            )));
        }
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PaysimError::InvalidInput(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    Ok(())
}

fn log_retry(attempt: u32, max: u32, reason: &str, delay_ms: u64) {
    eprintln!("  ↻ Retry {attempt}/{max}: {reason} (waiting {delay_ms}ms)");
}

fn log_accepted(delay_ms: u64) {
    eprintln!("  … accepted, checking status in {delay_ms}ms");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use super::*;
    use crate::gateway::types::SubmitResponse;
    use crate::gateway::{ChannelError, LocalChannel};
    use crate::ledger::IdempotencyLedger;
    use crate::simulator::{Outcome, ScriptedOutcomes};
    use crate::state_machine::Phase;

    const EMAIL: &str = "ada@example.com";

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 20,
            poll_interval_ms: 20,
        }
    }

    fn scripted_controller(
        outcomes: impl IntoIterator<Item = Outcome>,
    ) -> (SubmissionController<LocalChannel>, IdempotencyLedger) {
        let ledger = IdempotencyLedger::new(Box::new(ScriptedOutcomes::new(outcomes)));
        let controller =
            SubmissionController::new(LocalChannel::new(ledger.clone()), fast_retry());
        (controller, ledger)
    }

    #[tokio::test]
    async fn immediate_success_reaches_success_phase() {
        let (controller, ledger) = scripted_controller([Outcome::ImmediateSuccess]);

        let receipt = controller.submit(EMAIL, 100.50).await.unwrap().unwrap();
        assert_eq!(receipt.amount, 100.50);
        assert_eq!(receipt.email, EMAIL);
        assert_eq!(receipt.retry_count, 0);

        let state = controller.snapshot();
        assert_eq!(state.phase, Phase::Success);
        assert!(state.current_request_id.is_some());
        assert_eq!(ledger.record_count(), 1);
    }

    #[tokio::test]
    async fn persistent_transient_failures_exhaust_after_three_retries() {
        let (controller, _ledger) = scripted_controller([Outcome::TransientFailure {
            retry_after_seconds: 1,
        }]);

        let start = Instant::now();
        let err = controller.submit(EMAIL, 10.0).await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            PaysimError::ExhaustedRetries { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        // Backoff waits of 20, 40 and 80ms must all have elapsed.
        assert!(elapsed >= Duration::from_millis(140), "elapsed {elapsed:?}");

        let state = controller.snapshot();
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.retry_count, 3);
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn retries_reuse_the_same_request_id() {
        struct Recording {
            inner: LocalChannel,
            ids: Mutex<Vec<String>>,
        }
        impl SubmitChannel for Recording {
            async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, ChannelError> {
                self.ids.lock().unwrap().push(req.request_id.clone());
                self.inner.submit(req).await
            }
            async fn status(&self, request_id: &str) -> Result<StatusResponse, ChannelError> {
                self.inner.status(request_id).await
            }
        }

        let ledger = IdempotencyLedger::new(Box::new(ScriptedOutcomes::new([
            Outcome::TransientFailure { retry_after_seconds: 1 },
            Outcome::TransientFailure { retry_after_seconds: 1 },
            Outcome::ImmediateSuccess,
        ])));
        let channel = Recording {
            inner: LocalChannel::new(ledger.clone()),
            ids: Mutex::new(Vec::new()),
        };
        let controller = SubmissionController::new(channel, fast_retry());

        let receipt = controller.submit(EMAIL, 10.0).await.unwrap().unwrap();
        assert_eq!(receipt.retry_count, 2);

        let ids = controller.channel.ids.lock().unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(ledger.record_count(), 1);
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_a_no_op() {
        let (controller, _ledger) =
            scripted_controller([Outcome::DelayedSuccess { delay_ms: 300 }]);
        let controller = Arc::new(controller);

        let running = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.submit(EMAIL, 10.0).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first_id = controller.snapshot().current_request_id;
        assert!(first_id.is_some());

        // Single-flight: the second submit changes nothing.
        let second = controller.submit(EMAIL, 99.0).await.unwrap();
        assert!(second.is_none());
        assert_eq!(controller.snapshot().current_request_id, first_id);

        let receipt = running.await.unwrap().unwrap().unwrap();
        assert_eq!(receipt.amount, 10.0);
    }

    #[tokio::test]
    async fn submit_rejected_from_terminal_phase_until_reset() {
        let (controller, _ledger) = scripted_controller([Outcome::ImmediateSuccess]);

        let first = controller.submit(EMAIL, 10.0).await.unwrap().unwrap();
        assert!(controller.submit(EMAIL, 10.0).await.unwrap().is_none());

        assert!(controller.reset());
        let state = controller.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.current_request_id.is_none());

        let second = controller.submit(EMAIL, 20.0).await.unwrap().unwrap();
        // A fresh logical submission gets a fresh idempotency key.
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn cancel_during_backoff_makes_the_timer_stale() {
        let ledger = IdempotencyLedger::new(Box::new(ScriptedOutcomes::new([
            Outcome::TransientFailure { retry_after_seconds: 1 },
        ])));
        let retry = RetryConfig {
            max_retries: 3,
            base_delay_ms: 200,
            poll_interval_ms: 20,
        };
        let controller = Arc::new(SubmissionController::new(
            LocalChannel::new(ledger.clone()),
            retry,
        ));

        let running = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.submit(EMAIL, 10.0).await })
        };
        // Let the first dispatch fail and enter its 200ms backoff wait.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.cancel());

        // The timer fires after the cancel and must not mutate state.
        let outcome = running.await.unwrap().unwrap();
        assert!(outcome.is_none());

        let state = controller.snapshot();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.current_request_id.is_none());
        assert_eq!(state.retry_count, 0);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn delayed_submission_polls_until_resolved() {
        let (controller, ledger) =
            scripted_controller([Outcome::DelayedSuccess { delay_ms: 60 }]);

        let start = Instant::now();
        let receipt = controller.submit(EMAIL, 42.0).await.unwrap().unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(receipt.retry_count, 0);
        assert_eq!(receipt.amount, 42.0);
        assert_eq!(controller.snapshot().phase, Phase::Success);
        assert_eq!(ledger.record_count(), 1);
    }

    #[tokio::test]
    async fn channel_failures_count_toward_the_retry_budget() {
        struct Flaky {
            inner: LocalChannel,
            failures_left: AtomicU32,
        }
        impl SubmitChannel for Flaky {
            async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, ChannelError> {
                if self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(ChannelError::UnexpectedStatus {
                        status: 502,
                        message: "bad gateway".into(),
                    });
                }
                self.inner.submit(req).await
            }
            async fn status(&self, request_id: &str) -> Result<StatusResponse, ChannelError> {
                self.inner.status(request_id).await
            }
        }

        let ledger = IdempotencyLedger::new(Box::new(ScriptedOutcomes::new([
            Outcome::ImmediateSuccess,
        ])));
        let channel = Flaky {
            inner: LocalChannel::new(ledger.clone()),
            failures_left: AtomicU32::new(2),
        };
        let controller = SubmissionController::new(channel, fast_retry());

        let receipt = controller.submit(EMAIL, 10.0).await.unwrap().unwrap();
        assert_eq!(receipt.retry_count, 2);
        assert_eq!(ledger.record_count(), 1);
    }

    #[tokio::test]
    async fn vanished_record_during_poll_is_terminal() {
        struct Vanishing;
        impl SubmitChannel for Vanishing {
            async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, ChannelError> {
                Ok(SubmitResponse::Accepted(crate::gateway::types::AcceptedBody {
                    message: "payment accepted for processing".into(),
                    request_id: req.request_id.clone(),
                    email: req.email.clone(),
                    amount: req.amount,
                    estimated_delay_ms: 10,
                }))
            }
            async fn status(&self, request_id: &str) -> Result<StatusResponse, ChannelError> {
                Ok(StatusResponse::NotFound {
                    request_id: request_id.to_string(),
                })
            }
        }

        let controller = SubmissionController::new(Vanishing, fast_retry());
        let err = controller.submit(EMAIL, 10.0).await.unwrap_err();
        assert!(matches!(err, PaysimError::UnknownRequestId(_)));
        assert_eq!(controller.snapshot().phase, Phase::Error);
    }

    #[tokio::test]
    async fn invalid_input_never_dispatches() {
        let (controller, ledger) = scripted_controller([Outcome::ImmediateSuccess]);

        for (email, amount) in [
            ("not-an-email", 10.0),
            ("@example.com", 10.0),
            ("ada@nodot", 10.0),
            (EMAIL, 0.0),
            (EMAIL, -5.0),
            (EMAIL, f64::NAN),
        ] {
            let err = controller.submit(email, amount).await.unwrap_err();
            assert!(
                matches!(err, PaysimError::InvalidInput(_)),
                "expected invalid input for ({email}, {amount})"
            );
        }

        // Nothing reached the ledger, and the controller never left idle.
        assert_eq!(ledger.record_count(), 0);
        assert_eq!(controller.snapshot().phase, Phase::Idle);
    }
}
