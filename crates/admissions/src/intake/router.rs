use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::{error, warn};

use super::domain::{IntakeResponse, SubmissionPayload};
use super::mail::Mailer;
use super::service::{intake_response, IntakeService};
use super::sheet::TabularStore;
use super::storage::DocumentStore;
use crate::apply::DocumentSlot;

pub const INTAKE_ROUTE: &str = "/api/v1/applications";

/// Room for the applicant fields and JSON framing around the documents.
const ENVELOPE_BYTES: usize = 1024 * 1024;

/// Largest request body a full set of documents at `max_file_bytes` each can
/// produce once base64 encoded.
pub fn submission_body_limit(max_file_bytes: u64) -> usize {
    let encoded_file = max_file_bytes.div_ceil(3).saturating_mul(4);
    let documents = encoded_file.saturating_mul(DocumentSlot::ALL.len() as u64);
    usize::try_from(documents)
        .unwrap_or(usize::MAX)
        .saturating_add(ENVELOPE_BYTES)
}

/// Router exposing the intake endpoint with the given request body limit.
pub fn intake_router<D, T, M>(service: Arc<IntakeService<D, T, M>>, body_limit: usize) -> Router
where
    D: DocumentStore + ?Sized + 'static,
    T: TabularStore + ?Sized + 'static,
    M: Mailer + ?Sized + 'static,
{
    Router::new()
        .route(INTAKE_ROUTE, post(submit_handler::<D, T, M>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Accepts the JSON body whatever the declared content type, since no-cors
/// browser posts arrive as `text/plain`.
pub(crate) async fn submit_handler<D, T, M>(
    State(service): State<Arc<IntakeService<D, T, M>>>,
    body: Bytes,
) -> Response
where
    D: DocumentStore + ?Sized + 'static,
    T: TabularStore + ?Sized + 'static,
    M: Mailer + ?Sized + 'static,
{
    let payload: SubmissionPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "rejected malformed submission");
            return status_response(
                StatusCode::BAD_REQUEST,
                IntakeResponse::Error {
                    message: format!("malformed submission: {err}"),
                },
            );
        }
    };

    match tokio::task::spawn_blocking(move || service.process(payload)).await {
        Ok(result) => {
            let status = result
                .as_ref()
                .err()
                .map_or(StatusCode::OK, |err| err.status_code());
            status_response(status, intake_response(result))
        }
        Err(join_error) => {
            error!(error = %join_error, "intake worker aborted");
            status_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                IntakeResponse::Error {
                    message: "intake worker aborted".to_string(),
                },
            )
        }
    }
}

fn status_response(status: StatusCode, body: IntakeResponse) -> Response {
    (status, Json(body)).into_response()
}
