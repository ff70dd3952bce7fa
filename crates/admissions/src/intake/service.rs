use std::sync::Arc;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::domain::{
    ApplicationId, DocumentUpload, IntakeReceipt, IntakeResponse, StoredDocument,
    SubmissionPayload,
};
use super::mail::{parse_address, ConfirmationEmail, Mailer};
use super::sheet::{ApplicationRow, StoreError, TabularStore};
use super::storage::{DocumentStore, StorageError};
use crate::config::IntakeConfig;

/// Fixed values stamped onto every processed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSettings {
    pub institution: String,
    pub id_prefix: String,
}

impl From<&IntakeConfig> for IntakeSettings {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            institution: config.institution.clone(),
            id_prefix: config.id_prefix.clone(),
        }
    }
}

/// Stores documents, records the row, then notifies the applicant.
///
/// Steps are not transactional: a failure leaves earlier side effects in place.
pub struct IntakeService<D: ?Sized, T: ?Sized, M: ?Sized> {
    documents: Arc<D>,
    sheet: Arc<T>,
    mailer: Arc<M>,
    settings: IntakeSettings,
}

impl<D, T, M> IntakeService<D, T, M>
where
    D: DocumentStore + ?Sized + 'static,
    T: TabularStore + ?Sized + 'static,
    M: Mailer + ?Sized + 'static,
{
    pub fn new(documents: Arc<D>, sheet: Arc<T>, mailer: Arc<M>, settings: IntakeSettings) -> Self {
        Self {
            documents,
            sheet,
            mailer,
            settings,
        }
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    /// Creates the sheet and header row if absent. Safe to repeat.
    pub fn setup(&self) -> Result<bool, IntakeError> {
        Ok(self.sheet.ensure_headers()?)
    }

    pub fn process(&self, payload: SubmissionPayload) -> Result<IntakeReceipt, IntakeError> {
        self.process_at(payload, Utc::now())
    }

    pub fn process_at(
        &self,
        payload: SubmissionPayload,
        now: DateTime<Utc>,
    ) -> Result<IntakeReceipt, IntakeError> {
        parse_address(&payload.email)
            .map_err(|_| IntakeError::InvalidEmail(payload.email.clone()))?;

        let application_id = ApplicationId::generate(&self.settings.id_prefix, now);
        let documents = self.store_documents(&payload, &application_id)?;

        let institution = payload
            .institution
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.settings.institution.clone());
        let row = ApplicationRow {
            submitted_at: now,
            name: payload.name.clone(),
            email: payload.email.clone(),
            phone: payload.phone.clone(),
            course: payload.course.clone(),
            institution,
            payment_id: payload.payment_id.clone(),
            amount: payload.application_fee,
            files: documents.iter().map(StoredDocument::sheet_entry).collect(),
        };
        self.sheet.append(&row)?;
        info!(
            %application_id,
            course = %payload.course,
            attachments = documents.len(),
            "application recorded"
        );

        let notified = self.notify(&payload, &application_id);

        Ok(IntakeReceipt {
            application_id,
            documents,
            notified,
        })
    }

    /// Top-level entry point: never fails, converts errors into an error status.
    pub fn handle(&self, payload: SubmissionPayload) -> IntakeResponse {
        intake_response(self.process(payload))
    }

    fn store_documents(
        &self,
        payload: &SubmissionPayload,
        application_id: &ApplicationId,
    ) -> Result<Vec<StoredDocument>, IntakeError> {
        payload
            .attachments()
            .into_iter()
            .filter(|attachment| !attachment.is_blank())
            .enumerate()
            .map(|(position, attachment)| -> Result<StoredDocument, IntakeError> {
                let bytes = decode_attachment(&attachment.data).map_err(|source| {
                    IntakeError::Decode {
                        field: attachment.field_name.clone(),
                        source,
                    }
                })?;
                let upload = DocumentUpload {
                    application_id: application_id.clone(),
                    position,
                    content_type: attachment.content_type().to_string(),
                    field_name: attachment.field_name,
                    file_name: attachment.name,
                    bytes,
                };
                Ok(self.documents.store(&upload)?)
            })
            .collect()
    }

    fn notify(&self, payload: &SubmissionPayload, application_id: &ApplicationId) -> bool {
        let confirmation = ConfirmationEmail {
            institution: &self.settings.institution,
            applicant_name: payload.name.trim(),
            application_id,
            course: &payload.course,
            payment_id: payload.payment_id.as_deref(),
            amount: payload.application_fee,
        };

        match self.mailer.send(&confirmation.to_mail(&payload.email)) {
            Ok(()) => true,
            Err(err) => {
                warn!(%application_id, error = %err, "confirmation email not sent");
                false
            }
        }
    }
}

/// Status payload for a processing outcome; failures are logged here.
pub(crate) fn intake_response(result: Result<IntakeReceipt, IntakeError>) -> IntakeResponse {
    match result {
        Ok(receipt) => IntakeResponse::Success {
            application_id: receipt.application_id,
        },
        Err(err) => {
            error!(error = %err, "application intake failed");
            IntakeResponse::Error {
                message: err.to_string(),
            }
        }
    }
}

/// Accepts bare base64 as well as a full `data:` URL.
fn decode_attachment(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = data.trim();
    let encoded = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    BASE64.decode(encoded)
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("attachment '{field}' is not valid base64: {source}")]
    Decode {
        field: String,
        source: base64::DecodeError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntakeError {
    /// Errors caused by the submitted payload rather than a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IntakeError::InvalidEmail(_) | IntakeError::Decode { .. }
        )
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
