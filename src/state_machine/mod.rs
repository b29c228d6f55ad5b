mod phase;
mod submission;

pub use phase::{ControllerState, NextStep, Phase, SubmissionMachine, SubmitEvent};
pub use submission::{mint_request_id, RetryConfig, SubmissionReceipt};
