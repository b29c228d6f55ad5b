pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpChannel, LocalChannel, SubmitChannel};
pub use error::ChannelError;
pub use types::{StatusResponse, SubmitRequest, SubmitResponse};
