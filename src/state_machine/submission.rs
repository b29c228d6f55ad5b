use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::types::SuccessBody;

use super::phase::Phase;

/// Configuration for retry and poll timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries before a submission is marked failed.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Fixed interval between status polls for a delayed submission.
    pub poll_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            poll_interval_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given retry attempt using exponential backoff.
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms * 2u64.pow(attempt.saturating_sub(1))
    }
}

/// Mint the idempotency key for a new logical submission:
/// `{email}-{timestamp_millis}-{random_token}`.
///
/// Minted exactly once per submission lifecycle; retries and polls reuse it.
pub fn mint_request_id(email: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{email}-{}-{}", Utc::now().timestamp_millis(), &token[..8])
}

/// Client-side record of a resolved submission, printed at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub request_id: String,
    pub email: String,
    pub amount: f64,
    pub status: Phase,
    pub retry_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl SubmissionReceipt {
    /// Build a receipt from the final success payload.
    pub fn from_success(body: &SuccessBody, retry_count: u32, started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            request_id: body.request_id.clone(),
            email: body.email.clone(),
            amount: body.amount,
            status: Phase::Success,
            retry_count,
            started_at,
            completed_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_exponential_backoff() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(1), 1000);
        assert_eq!(config.delay_for_attempt(2), 2000);
        assert_eq!(config.delay_for_attempt(3), 4000);
        assert_eq!(config.delay_for_attempt(4), 8000);
    }

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn request_id_carries_email_prefix() {
        let id = mint_request_id("ada@example.com");
        assert!(id.starts_with("ada@example.com-"));

        let tail = &id["ada@example.com-".len()..];
        let (timestamp, token) = tail.split_once('-').unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        assert_eq!(token.len(), 8);
    }

    #[test]
    fn request_ids_are_unique_per_mint() {
        let a = mint_request_id("ada@example.com");
        let b = mint_request_id("ada@example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn receipt_from_success_payload() {
        let started = Utc::now();
        let body = SuccessBody {
            message: "payment processed successfully".into(),
            request_id: "req-1".into(),
            email: "ada@example.com".into(),
            amount: 100.50,
            timestamp: Utc::now(),
        };
        let receipt = SubmissionReceipt::from_success(&body, 2, started);

        assert_eq!(receipt.request_id, "req-1");
        assert_eq!(receipt.amount, 100.50);
        assert_eq!(receipt.status, Phase::Success);
        assert_eq!(receipt.retry_count, 2);
        assert!(receipt.duration_ms >= 0);
    }

    #[test]
    fn receipt_serialization_roundtrip() {
        let body = SuccessBody {
            message: "payment processed successfully".into(),
            request_id: "req-1".into(),
            email: "ada@example.com".into(),
            amount: 9.99,
            timestamp: Utc::now(),
        };
        let receipt = SubmissionReceipt::from_success(&body, 0, Utc::now());
        let json = serde_json::to_string(&receipt).unwrap();
        let parsed: SubmissionReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, "req-1");
        assert_eq!(parsed.status, Phase::Success);
    }
}
