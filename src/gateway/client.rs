use std::time::Duration;

use reqwest::Client;

use crate::ledger::IdempotencyLedger;

use super::error::ChannelError;
use super::types::{StatusResponse, SubmitRequest, SubmitResponse};

/// Correlation header carrying the idempotency key on every HTTP call,
/// including retries and status polls.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request/response seam between the controller and the gateway.
///
/// The controller only ever sees these two calls; whether they resolve
/// against the in-process ledger or a remote HTTP gateway is invisible.
pub trait SubmitChannel {
    async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, ChannelError>;
    async fn status(&self, request_id: &str) -> Result<StatusResponse, ChannelError>;
}

/// Channel wired directly to an in-process [`IdempotencyLedger`].
pub struct LocalChannel {
    ledger: IdempotencyLedger,
}

impl LocalChannel {
    pub fn new(ledger: IdempotencyLedger) -> Self {
        Self { ledger }
    }
}

impl SubmitChannel for LocalChannel {
    async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, ChannelError> {
        Ok(self.ledger.submit(&req.request_id, &req.email, req.amount))
    }

    async fn status(&self, request_id: &str) -> Result<StatusResponse, ChannelError> {
        Ok(match self.ledger.get_status(request_id) {
            Some(body) => StatusResponse::Found(body),
            None => StatusResponse::NotFound {
                request_id: request_id.to_string(),
            },
        })
    }
}

/// Channel speaking JSON over HTTP to a remote gateway.
pub struct HttpChannel {
    client: Client,
    base_url: String,
}

impl HttpChannel {
    /// Create a channel pointing at the gateway's base URL.
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { client, base_url }
    }
}

impl SubmitChannel for HttpChannel {
    async fn submit(&self, req: &SubmitRequest) -> Result<SubmitResponse, ChannelError> {
        let response = self
            .client
            .post(format!("{}/submit", self.base_url))
            .header(REQUEST_ID_HEADER, &req.request_id)
            .json(req)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(SubmitResponse::Success(response.json().await?)),
            202 => Ok(SubmitResponse::Accepted(response.json().await?)),
            503 => Ok(SubmitResponse::TransientFailure(response.json().await?)),
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(ChannelError::UnexpectedStatus { status, message })
            }
        }
    }

    async fn status(&self, request_id: &str) -> Result<StatusResponse, ChannelError> {
        let response = self
            .client
            .get(format!("{}/status/{request_id}", self.base_url))
            .header(REQUEST_ID_HEADER, request_id)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(StatusResponse::Found(response.json().await?)),
            404 => Ok(StatusResponse::NotFound {
                request_id: request_id.to_string(),
            }),
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(ChannelError::UnexpectedStatus { status, message })
            }
        }
    }
}
