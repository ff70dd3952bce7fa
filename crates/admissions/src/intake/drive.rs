use std::fmt::Debug;
use std::io::Cursor;
use std::sync::Mutex;

use google_drive3::api::{File, Permission, Scope};
use google_drive3::DriveHub;
use tokio::runtime::Handle;
use tracing::info;

use super::domain::{DocumentUpload, StoredDocument};
use super::storage::{DocumentStore, StorageError};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file Drive accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub web_view_link: Option<String>,
}

/// Metadata and content for one upload into a folder.
#[derive(Debug, Clone, Copy)]
pub struct DriveUpload<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub parent_id: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// The handful of Drive calls the document store needs.
pub trait DriveGateway: Debug + Send + Sync {
    fn find_folder(&self, name: &str) -> Result<Option<String>, StorageError>;
    fn create_folder(&self, name: &str) -> Result<String, StorageError>;
    fn upload(&self, upload: &DriveUpload<'_>) -> Result<DriveFile, StorageError>;
    fn grant(&self, file_id: &str, role: &str, grantee: &str) -> Result<(), StorageError>;
}

/// Document store backed by a shared Google Drive folder, resolved by name
/// on first use unless its id is supplied.
#[derive(Debug)]
pub struct GoogleDriveDocumentStore {
    drive: Box<dyn DriveGateway>,
    folder_name: String,
    folder_id: Mutex<Option<String>>,
}

impl GoogleDriveDocumentStore {
    pub fn new(drive: Box<dyn DriveGateway>, folder_name: impl Into<String>) -> Self {
        Self {
            drive,
            folder_name: folder_name.into(),
            folder_id: Mutex::new(None),
        }
    }

    /// Skip the folder lookup when the shared folder id is already known.
    pub fn with_folder_id(self, folder_id: impl Into<String>) -> Self {
        Self {
            folder_id: Mutex::new(Some(folder_id.into())),
            ..self
        }
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    /// Lookup and creation happen under the lock so concurrent first uploads
    /// share one folder.
    fn shared_folder(&self) -> Result<String, StorageError> {
        let mut folder_id = self
            .folder_id
            .lock()
            .map_err(|_| StorageError::Backend("drive folder lock poisoned".to_string()))?;
        if let Some(id) = folder_id.as_ref() {
            return Ok(id.clone());
        }

        let id = match self.drive.find_folder(&self.folder_name)? {
            Some(id) => id,
            None => {
                let id = self.drive.create_folder(&self.folder_name)?;
                info!(folder = %self.folder_name, "created shared application folder");
                id
            }
        };
        Ok(folder_id.insert(id).clone())
    }
}

impl DocumentStore for GoogleDriveDocumentStore {
    fn store(&self, upload: &DocumentUpload) -> Result<StoredDocument, StorageError> {
        let folder_id = self.shared_folder()?;
        let description = format!("{} ({})", upload.field_name, upload.application_id);
        let file = self.drive.upload(&DriveUpload {
            name: &upload.file_name,
            description: &description,
            parent_id: &folder_id,
            content_type: &upload.content_type,
            bytes: &upload.bytes,
        })?;

        self.drive.grant(&file.id, "reader", "anyone")?;

        let location = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));

        Ok(StoredDocument {
            field_name: upload.field_name.clone(),
            file_name: upload.file_name.clone(),
            location,
        })
    }
}

/// Wraps the generated google-drive3 client. Calls are driven to completion
/// on the supplied runtime handle, so it must be used from a blocking thread
/// (the intake router runs the service under `spawn_blocking`).
pub struct GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    runtime: Handle,
}

impl<C> GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, runtime: Handle) -> Self {
        Self { hub, runtime }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> StorageError {
        StorageError::Backend(err.to_string())
    }
}

impl<C> std::fmt::Debug for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveClient").finish_non_exhaustive()
    }
}

impl<C> DriveGateway for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn find_folder(&self, name: &str) -> Result<Option<String>, StorageError> {
        let escaped = name.replace('\'', "\\'");
        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .list()
                .q(&format!(
                    "mimeType='{FOLDER_MIME_TYPE}' and name='{escaped}' and trashed=false"
                ))
                .param("fields", "files(id)")
                .page_size(1)
                .include_items_from_all_drives(true)
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .doit()
                .await
        });
        let (_, listing) = result.map_err(Self::map_error)?;
        Ok(listing
            .files
            .unwrap_or_default()
            .into_iter()
            .find_map(|file| file.id))
    }

    fn create_folder(&self, name: &str) -> Result<String, StorageError> {
        let metadata = File {
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            ..File::default()
        };
        let folder_type = FOLDER_MIME_TYPE
            .parse::<mime::Mime>()
            .map_err(Self::map_error)?;

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .create(metadata)
                .param("fields", "id")
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .upload(Cursor::new(Vec::new()), folder_type)
                .await
        });

        let (_, folder) = result.map_err(Self::map_error)?;
        folder
            .id
            .ok_or_else(|| StorageError::Backend("folder created without an id".to_string()))
    }

    fn upload(&self, upload: &DriveUpload<'_>) -> Result<DriveFile, StorageError> {
        let metadata = File {
            name: Some(upload.name.to_string()),
            description: Some(upload.description.to_string()),
            parents: Some(vec![upload.parent_id.to_string()]),
            ..File::default()
        };
        let content_type = upload
            .content_type
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let cursor = Cursor::new(upload.bytes.to_vec());

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .create(metadata)
                .param("fields", "id,webViewLink")
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .upload(cursor, content_type)
                .await
        });
        let (_, file) = result.map_err(Self::map_error)?;
        let id = file
            .id
            .ok_or_else(|| StorageError::Backend("upload returned no file id".to_string()))?;

        Ok(DriveFile {
            id,
            web_view_link: file.web_view_link,
        })
    }

    fn grant(&self, file_id: &str, role: &str, grantee: &str) -> Result<(), StorageError> {
        let permission = Permission {
            role: Some(role.to_string()),
            type_: Some(grantee.to_string()),
            ..Permission::default()
        };

        let result = self.runtime.block_on(async {
            self.hub
                .permissions()
                .create(permission, file_id)
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .doit()
                .await
        });
        result.map(|_| ()).map_err(Self::map_error)
    }
}
