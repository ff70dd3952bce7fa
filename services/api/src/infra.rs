use admissions::config::{AppConfig, StorageConfig};
use admissions::error::AppError;
use admissions::intake::{
    CsvTabularStore, DocumentStore, GoogleDriveClient, GoogleDriveDocumentStore, IntakeService,
    IntakeSettings, LocalDocumentStore, LogMailer, Mailer, SmtpMailer,
};
use google_drive3::{hyper_rustls, hyper_util, yup_oauth2, DriveHub};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Intake service with its backends chosen at runtime.
pub(crate) type SharedIntakeService = IntakeService<dyn DocumentStore, CsvTabularStore, dyn Mailer>;

pub(crate) struct IntakeBackends {
    pub(crate) service: Arc<SharedIntakeService>,
    /// Present when documents are kept on local disk and served by this process.
    pub(crate) local_files: Option<Arc<LocalDocumentStore>>,
}

pub(crate) async fn intake_backends(config: &AppConfig) -> Result<IntakeBackends, AppError> {
    let (documents, local_files) = match &config.intake.storage {
        StorageConfig::Local {
            upload_dir,
            public_url,
        } => {
            tokio::fs::create_dir_all(upload_dir).await?;
            info!(upload_dir = %upload_dir.display(), "storing documents on local disk");
            let store = Arc::new(LocalDocumentStore::new(upload_dir.clone(), public_url.clone()));
            (store.clone() as Arc<dyn DocumentStore>, Some(store))
        }
        StorageConfig::Drive {
            folder_name,
            folder_id,
            service_account_key,
        } => {
            let hub = drive_hub(service_account_key).await?;
            let client = GoogleDriveClient::new(hub, tokio::runtime::Handle::current());
            let mut store = GoogleDriveDocumentStore::new(Box::new(client), folder_name.clone());
            if let Some(folder_id) = folder_id {
                store = store.with_folder_id(folder_id.clone());
            }
            info!(folder = %folder_name, "storing documents in Google Drive");
            (Arc::new(store) as Arc<dyn DocumentStore>, None)
        }
    };

    if let Some(parent) = config
        .intake
        .sheet_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let sheet = Arc::new(CsvTabularStore::new(config.intake.sheet_path.clone()));
    let mailer = mailer(config)?;

    let service = IntakeService::new(
        documents,
        sheet,
        mailer,
        IntakeSettings::from(&config.intake),
    );

    Ok(IntakeBackends {
        service: Arc::new(service),
        local_files,
    })
}

pub(crate) fn mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>, AppError> {
    match SmtpMailer::from_config(&config.mail)? {
        Some(smtp) => Ok(Arc::new(smtp)),
        None => {
            info!("no SMTP relay configured; confirmations are logged only");
            Ok(Arc::new(LogMailer::default()))
        }
    }
}

type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

async fn drive_hub(key_path: &Path) -> Result<DriveHub<HttpsConnector>, AppError> {
    let key = yup_oauth2::read_service_account_key(key_path).await?;
    let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await?;

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .build();
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(connector);

    Ok(DriveHub::new(client, auth))
}
