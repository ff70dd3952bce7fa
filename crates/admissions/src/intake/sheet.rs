use std::fmt::Debug;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Column order of the applications sheet. Every row follows it.
pub const SHEET_HEADERS: [&str; 9] = [
    "Date",
    "Name",
    "Email",
    "Phone",
    "Course",
    "Institution",
    "Payment ID",
    "Amount",
    "Files",
];

/// One flattened application as it lands in the tabular store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRow {
    pub submitted_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub institution: String,
    pub payment_id: Option<String>,
    pub amount: Option<u32>,
    pub files: Vec<String>,
}

impl ApplicationRow {
    pub fn to_record(&self) -> [String; 9] {
        [
            self.submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.course.clone(),
            self.institution.clone(),
            self.payment_id.clone().unwrap_or_default(),
            self.amount.map(|amount| amount.to_string()).unwrap_or_default(),
            self.files.join("\n"),
        ]
    }
}

/// Append-only row store with a fixed header.
pub trait TabularStore: Debug + Send + Sync {
    /// Writes the header row when the store is absent or empty. Returns whether it wrote one.
    fn ensure_headers(&self) -> Result<bool, StoreError>;
    fn append(&self, row: &ApplicationRow) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("existing sheet header {found:?} does not match the applications schema")]
    SchemaMismatch { found: Vec<String> },
    #[error("tabular store lock poisoned")]
    Poisoned,
}

/// CSV file standing in for the applications spreadsheet.
#[derive(Debug)]
pub struct CsvTabularStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvTabularStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows in append order, header excluded.
    pub fn records(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        reader
            .records()
            .map(|record| {
                record
                    .map(|fields| fields.iter().map(str::to_string).collect())
                    .map_err(StoreError::from)
            })
            .collect()
    }

    fn ensure_headers_locked(&self) -> Result<bool, StoreError> {
        let empty = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => return Err(err.into()),
        };

        if !empty {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_path(&self.path)?;
            let mut header = csv::StringRecord::new();
            reader.read_record(&mut header)?;
            if header.iter().ne(SHEET_HEADERS.iter().copied()) {
                return Err(StoreError::SchemaMismatch {
                    found: header.iter().map(str::to_string).collect(),
                });
            }
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(SHEET_HEADERS)?;
        writer.flush()?;
        Ok(true)
    }
}

impl TabularStore for CsvTabularStore {
    fn ensure_headers(&self) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.ensure_headers_locked()
    }

    fn append(&self, row: &ApplicationRow) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.ensure_headers_locked()?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(row.to_record())?;
        writer.flush()?;
        Ok(())
    }
}
