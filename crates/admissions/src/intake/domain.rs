use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content type assumed when an attachment arrives without one.
pub const DEFAULT_ATTACHMENT_TYPE: &str = "application/pdf";

/// Field label used for the single-document legacy payload shape.
pub const LEGACY_FIELD_NAME: &str = "Document";

const TIME_CHARS: usize = 5;
const RANDOM_CHARS: usize = 3;

/// Identifier handed back to the applicant, e.g. `WMCH-LX3K9A2F`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    /// Time-ordered prefix plus a short random tail. Uniqueness is probabilistic.
    pub fn generate(prefix: &str, now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis().max(0) as u128;
        let time_part = to_base36(millis);
        let time_part = &time_part[time_part.len().saturating_sub(TIME_CHARS)..];

        let random_part = to_base36(Uuid::new_v4().as_u128());
        let random_part = &random_part[random_part.len().saturating_sub(RANDOM_CHARS)..];

        let token = format!(
            "{:0>tw$}{:0>rw$}",
            time_part,
            random_part,
            tw = TIME_CHARS,
            rw = RANDOM_CHARS
        );
        Self(format!("{}-{}", prefix.trim().to_ascii_uppercase(), token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut value: u128) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// JSON body posted by the apply form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default)]
    pub consent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_fee: Option<u32>,
    #[serde(default)]
    pub files: Vec<AttachmentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl SubmissionPayload {
    /// Attachments in submission order, folding in the single-file legacy fields.
    pub fn attachments(&self) -> Vec<AttachmentPayload> {
        if !self.files.is_empty() {
            return self.files.clone();
        }

        match (&self.file_data, &self.file_name) {
            (Some(data), Some(name)) => vec![AttachmentPayload {
                field_name: LEGACY_FIELD_NAME.to_string(),
                name: name.clone(),
                content_type: self.file_type.clone(),
                data: data.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

/// One uploaded document, base64 encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub field_name: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub data: String,
}

impl AttachmentPayload {
    pub fn is_blank(&self) -> bool {
        self.data.trim().is_empty() || self.name.trim().is_empty()
    }

    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_ATTACHMENT_TYPE)
    }
}

/// Decoded document ready for the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub application_id: ApplicationId,
    pub position: usize,
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where a document ended up once the store accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub field_name: String,
    pub file_name: String,
    pub location: String,
}

impl StoredDocument {
    pub fn sheet_entry(&self) -> String {
        format!("{}: {}", self.field_name, self.location)
    }
}

/// Result of a fully processed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeReceipt {
    pub application_id: ApplicationId,
    pub documents: Vec<StoredDocument>,
    pub notified: bool,
}

/// Status payload returned to the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IntakeResponse {
    Success {
        #[serde(rename = "applicationId")]
        application_id: ApplicationId,
    },
    Error {
        message: String,
    },
}

impl IntakeResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, IntakeResponse::Success { .. })
    }
}
