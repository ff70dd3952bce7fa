use crate::infra::AppState;
use admissions::error::AppError;
use admissions::intake::{LocalDocumentStore, LOCAL_FILES_ROUTE};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use std::io;
use std::sync::Arc;
use tracing::debug;

/// Adds probes, metrics, and (for local storage) the document download route.
pub(crate) fn with_service_routes(
    intake: Router,
    local_files: Option<Arc<LocalDocumentStore>>,
) -> Router {
    let router = intake
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint));

    match local_files {
        Some(store) => router.merge(files_router(store)),
        None => router,
    }
}

pub(crate) fn files_router(store: Arc<LocalDocumentStore>) -> Router {
    Router::new()
        .route(&format!("{LOCAL_FILES_ROUTE}/:name"), get(serve_document))
        .with_state(store)
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn serve_document(
    State(store): State<Arc<LocalDocumentStore>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let path = store
        .resolve(&name)
        .ok_or_else(|| AppError::Io(io::Error::from(io::ErrorKind::NotFound)))?;
    let bytes = tokio::fs::read(&path).await?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    debug!(file = %name, %mime, "serving stored document");

    Ok((
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        bytes,
    )
        .into_response())
}
