use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;
const PHONE_DIGITS: usize = 10;

/// Applicant fields collected on the first step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub consent: bool,
}

impl ApplicantDetails {
    /// Every failing rule, in form order. Empty when the details may advance.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let name_chars = self.name.trim().chars().count();
        if name_chars < NAME_MIN_CHARS {
            errors.push(FieldError::NameTooShort);
        } else if name_chars > NAME_MAX_CHARS {
            errors.push(FieldError::NameTooLong);
        }

        if self.email.trim().parse::<lettre::Address>().is_err() {
            errors.push(FieldError::InvalidEmail);
        }

        let phone = self.phone.trim();
        if phone.len() != PHONE_DIGITS || !phone.chars().all(|c| c.is_ascii_digit()) {
            errors.push(FieldError::InvalidPhone);
        }

        if self.course.trim().is_empty() {
            errors.push(FieldError::MissingProgram);
        }

        if !self.consent {
            errors.push(FieldError::ConsentRequired);
        }

        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Name must be at least 2 characters")]
    NameTooShort,
    #[error("Name must be at most 100 characters")]
    NameTooLong,
    #[error("Please enter a valid email")]
    InvalidEmail,
    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhone,
    #[error("Please select a program")]
    MissingProgram,
    #[error("You must agree to be contacted")]
    ConsentRequired,
}

/// The mandatory documents, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSlot {
    Marksheet,
    Aadhar,
    Signature,
    Photo,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 4] = [
        DocumentSlot::Marksheet,
        DocumentSlot::Aadhar,
        DocumentSlot::Signature,
        DocumentSlot::Photo,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DocumentSlot::Marksheet => "marksheet",
            DocumentSlot::Aadhar => "aadhar",
            DocumentSlot::Signature => "signature",
            DocumentSlot::Photo => "photo",
        }
    }

    /// Human label, also the `fieldName` sent with the attachment.
    pub fn label(self) -> &'static str {
        match self {
            DocumentSlot::Marksheet => "10th/12th Marksheet",
            DocumentSlot::Aadhar => "Aadhar Card",
            DocumentSlot::Signature => "Signature",
            DocumentSlot::Photo => "Passport Size Photo",
        }
    }

    pub fn accepts(self, file: &SelectedFile) -> bool {
        let mime = file.mime_type.trim().to_ascii_lowercase();
        match self {
            DocumentSlot::Photo => mime.starts_with("image/"),
            _ => {
                matches!(
                    mime.as_str(),
                    "application/pdf" | "image/jpeg" | "image/jpg" | "image/png"
                ) || has_extension(&file.name, &["pdf", "jpg", "jpeg", "png"])
            }
        }
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentSlot {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        DocumentSlot::ALL
            .into_iter()
            .find(|slot| slot.key() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = DocumentSlot::ALL.iter().map(|slot| slot.key()).collect();
                format!("unknown document '{value}' (expected one of {})", known.join(", "))
            })
    }
}

fn has_extension(name: &str, allowed: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|candidate| ext.eq_ignore_ascii_case(candidate)))
        .unwrap_or(false)
}

/// A file picked for one of the document slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub source: FileSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Bytes(bytes),
        }
    }

    /// File read lazily at encoding time; the name is taken from the path.
    pub fn from_path(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Self {
            name,
            mime_type: mime_type.into(),
            source: FileSource::Path(path),
        }
    }

    pub fn size(&self) -> std::io::Result<u64> {
        match &self.source {
            FileSource::Bytes(bytes) => Ok(bytes.len() as u64),
            FileSource::Path(path) => std::fs::metadata(path).map(|meta| meta.len()),
        }
    }

    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => std::fs::read(path),
        }
    }

    /// Same as [`SelectedFile::read`] without blocking the executor on disk reads.
    pub async fn read_async(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}
