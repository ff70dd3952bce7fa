//! Remote intake handler: stores uploaded documents, appends the application
//! row, and mails the applicant a confirmation.

pub mod domain;
pub mod drive;
pub mod mail;
pub mod router;
pub mod service;
pub mod sheet;
pub mod storage;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, AttachmentPayload, DocumentUpload, IntakeReceipt, IntakeResponse,
    StoredDocument, SubmissionPayload,
};
pub use drive::{DriveFile, DriveGateway, DriveUpload, GoogleDriveClient, GoogleDriveDocumentStore};
pub use mail::{ConfirmationEmail, LogMailer, MailError, Mailer, OutgoingMail, SmtpMailer};
pub use router::{intake_router, submission_body_limit, INTAKE_ROUTE};
pub use service::{IntakeError, IntakeService, IntakeSettings};
pub use sheet::{ApplicationRow, CsvTabularStore, StoreError, TabularStore, SHEET_HEADERS};
pub use storage::{DocumentStore, LocalDocumentStore, StorageError, LOCAL_FILES_ROUTE};
