use std::future::Future;
use std::time::Duration;

use crate::intake::{IntakeResponse, SubmissionPayload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("submission request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("intake endpoint answered {status} without a status payload: {body}")]
    UnexpectedResponse { status: u16, body: String },
}

/// Delivers a submission to the intake handler and returns its acknowledgement.
pub trait SubmissionTransport {
    fn send(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<IntakeResponse, TransportError>> + Send;
}

/// POSTs the payload as JSON and reads the status payload back.
#[derive(Debug, Clone)]
pub struct HttpSubmissionTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSubmissionTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SubmissionTransport for HttpSubmissionTransport {
    async fn send(&self, payload: &SubmissionPayload) -> Result<IntakeResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        // Error statuses still carry a status payload worth surfacing.
        match serde_json::from_str::<IntakeResponse>(&body) {
            Ok(IntakeResponse::Success { .. }) if !status.is_success() => {
                Err(TransportError::UnexpectedResponse {
                    status: status.as_u16(),
                    body: excerpt(&body),
                })
            }
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(TransportError::UnexpectedResponse {
                status: status.as_u16(),
                body: excerpt(&body),
            }),
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
