use thiserror::Error;

use crate::gateway::ChannelError;

/// Crate-level error taxonomy.
///
/// Transient conditions never surface here directly — the controller
/// absorbs them into its retry budget and only `ExhaustedRetries` escapes.
/// `InvalidInput` and `UnknownRequestId` are terminal and never retried.
#[derive(Debug, Error)]
pub enum PaysimError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    #[error("Unknown request id: {0}")]
    UnknownRequestId(String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_retries_display() {
        let err = PaysimError::ExhaustedRetries {
            attempts: 3,
            last_error: "service temporarily unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "Retries exhausted after 3 attempts: service temporarily unavailable"
        );
    }

    #[test]
    fn unknown_request_id_display() {
        let err = PaysimError::UnknownRequestId("req-1".into());
        assert_eq!(err.to_string(), "Unknown request id: req-1");
    }

    #[test]
    fn channel_error_converts() {
        let err: PaysimError = ChannelError::UnexpectedStatus {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, PaysimError::Channel(_)));
    }
}
