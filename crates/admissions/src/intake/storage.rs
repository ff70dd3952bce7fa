use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use super::domain::{DocumentUpload, StoredDocument};

/// Persists uploaded documents under one shared location readable by link.
pub trait DocumentStore: Debug + Send + Sync {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to write document {file_name}: {source}")]
    Io {
        file_name: String,
        source: std::io::Error,
    },
    #[error("document backend failed: {0}")]
    Backend(String),
}

/// Route prefix under which [`LocalDocumentStore`] files are served.
pub const LOCAL_FILES_ROUTE: &str = "/files";

/// Filesystem-backed store that hands out links to the service's own file route.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
    public_url: String,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let public_url = public_url.into();
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a served file name back to disk, refusing anything that could escape the root.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let acceptable = !file_name.is_empty()
            && !file_name.starts_with('.')
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !acceptable {
            return None;
        }
        let path = self.root.join(file_name);
        path.is_file().then_some(path)
    }

    fn stored_name(upload: &DocumentUpload) -> String {
        format!(
            "{}-{}-{}",
            upload.application_id,
            upload.position + 1,
            sanitize_file_name(&upload.file_name)
        )
    }
}

impl DocumentStore for LocalDocumentStore {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, StorageError> {
        let stored_name = Self::stored_name(upload);
        let io_error = |source| StorageError::Io {
            file_name: stored_name.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_error)?;
        fs::write(self.root.join(&stored_name), &upload.bytes).map_err(io_error)?;

        Ok(StoredDocument {
            field_name: upload.field_name.clone(),
            file_name: upload.file_name.clone(),
            location: format!("{}{}/{}", self.public_url, LOCAL_FILES_ROUTE, stored_name),
        })
    }
}

pub(crate) fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(&['/', '\\'][..]).next().unwrap_or(raw);
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    while cleaned.starts_with('.') {
        cleaned.remove(0);
    }
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
