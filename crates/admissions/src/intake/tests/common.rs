use std::sync::{Arc, Mutex};

use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::intake::domain::{AttachmentPayload, DocumentUpload, StoredDocument, SubmissionPayload};
use crate::intake::mail::{MailError, Mailer, OutgoingMail};
use crate::intake::service::{IntakeService, IntakeSettings};
use crate::intake::sheet::{ApplicationRow, StoreError, TabularStore};
use crate::intake::storage::{DocumentStore, StorageError};

pub(super) const FIELD_NAMES: [&str; 4] = [
    "10th/12th Marksheet",
    "Aadhar Card",
    "Signature",
    "Passport Size Photo",
];

pub(super) fn settings() -> IntakeSettings {
    IntakeSettings {
        institution: "Wadeh Medical College and Hospital".to_string(),
        id_prefix: "WMCH".to_string(),
    }
}

pub(super) fn submitted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 8, 15, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn attachment(field_name: &str, index: usize) -> AttachmentPayload {
    AttachmentPayload {
        field_name: field_name.to_string(),
        name: format!("document-{index}.pdf"),
        content_type: Some("application/pdf".to_string()),
        data: BASE64.encode(format!("%PDF-1.4 document {index}")),
    }
}

pub(super) fn payload() -> SubmissionPayload {
    SubmissionPayload {
        name: "Rahul Sharma".to_string(),
        email: "rahul@example.com".to_string(),
        phone: "9876543210".to_string(),
        course: "bems".to_string(),
        consent: true,
        files: FIELD_NAMES
            .iter()
            .enumerate()
            .map(|(index, field)| attachment(field, index))
            .collect(),
        ..SubmissionPayload::default()
    }
}

pub(super) fn build_service() -> (
    IntakeService<MemoryDocuments, MemorySheet, MemoryMailer>,
    Arc<MemoryDocuments>,
    Arc<MemorySheet>,
    Arc<MemoryMailer>,
) {
    let documents = Arc::new(MemoryDocuments::default());
    let sheet = Arc::new(MemorySheet::default());
    let mailer = Arc::new(MemoryMailer::default());
    let service = IntakeService::new(
        documents.clone(),
        sheet.clone(),
        mailer.clone(),
        settings(),
    );
    (service, documents, sheet, mailer)
}

#[derive(Debug, Default)]
pub(super) struct MemoryDocuments {
    pub(super) uploads: Mutex<Vec<DocumentUpload>>,
}

impl MemoryDocuments {
    pub(super) fn uploads(&self) -> Vec<DocumentUpload> {
        self.uploads.lock().expect("documents mutex poisoned").clone()
    }
}

impl DocumentStore for MemoryDocuments {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, StorageError> {
        let mut guard = self.uploads.lock().expect("documents mutex poisoned");
        guard.push(upload.clone());
        Ok(StoredDocument {
            field_name: upload.field_name.clone(),
            file_name: upload.file_name.clone(),
            location: format!("https://storage.test/{}/{}", upload.application_id, guard.len()),
        })
    }
}

/// Accepts the first `accept` documents, then fails.
#[derive(Debug)]
pub(super) struct FlakyDocuments {
    pub(super) accept: usize,
    pub(super) stored: Mutex<usize>,
}

impl DocumentStore for FlakyDocuments {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, StorageError> {
        let mut stored = self.stored.lock().expect("documents mutex poisoned");
        if *stored >= self.accept {
            return Err(StorageError::Backend("quota exceeded".to_string()));
        }
        *stored += 1;
        Ok(StoredDocument {
            field_name: upload.field_name.clone(),
            file_name: upload.file_name.clone(),
            location: format!("https://storage.test/{}", upload.position),
        })
    }
}

#[derive(Debug, Default)]
pub(super) struct MemorySheet {
    pub(super) header_writes: Mutex<usize>,
    pub(super) rows: Mutex<Vec<ApplicationRow>>,
}

impl MemorySheet {
    pub(super) fn rows(&self) -> Vec<ApplicationRow> {
        self.rows.lock().expect("sheet mutex poisoned").clone()
    }

    pub(super) fn header_writes(&self) -> usize {
        *self.header_writes.lock().expect("sheet mutex poisoned")
    }
}

impl TabularStore for MemorySheet {
    fn ensure_headers(&self) -> Result<bool, StoreError> {
        let mut writes = self.header_writes.lock().expect("sheet mutex poisoned");
        if *writes == 0 {
            *writes = 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn append(&self, row: &ApplicationRow) -> Result<(), StoreError> {
        self.ensure_headers()?;
        self.rows
            .lock()
            .expect("sheet mutex poisoned")
            .push(row.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub(super) struct OfflineSheet;

impl TabularStore for OfflineSheet {
    fn ensure_headers(&self) -> Result<bool, StoreError> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "sheet is read only",
        )))
    }

    fn append(&self, _row: &ApplicationRow) -> Result<(), StoreError> {
        self.ensure_headers().map(|_| ())
    }
}

#[derive(Debug, Default)]
pub(super) struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    pub(super) fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(mail.clone());
        Ok(())
    }
}

#[derive(Debug)]
pub(super) struct BouncingMailer;

impl Mailer for BouncingMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        Err(MailError::Address {
            address: mail.to_address.clone(),
            source: "bounced@"
                .parse::<lettre::Address>()
                .expect_err("address rejected"),
        })
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
