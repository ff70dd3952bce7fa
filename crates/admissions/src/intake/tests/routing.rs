use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use super::common::*;
use crate::config::DEFAULT_MAX_FILE_BYTES;
use crate::intake::router::{
    intake_router, submission_body_limit, submit_handler, INTAKE_ROUTE,
};
use crate::intake::service::IntakeService;

fn body_limit() -> usize {
    submission_body_limit(DEFAULT_MAX_FILE_BYTES)
}

fn post(body: impl Into<Body>, content_type: &str) -> Request<Body> {
    Request::post(INTAKE_ROUTE)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .expect("request builds")
}

#[tokio::test]
async fn submit_route_returns_success_payload() {
    let (service, _, sheet, _) = build_service();
    let router = intake_router(Arc::new(service), body_limit());

    let body = serde_json::to_vec(&payload()).expect("payload serializes");
    let response = router
        .oneshot(post(body, "application/json"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json_body(response).await;
    assert_eq!(json["status"], "success");
    let id = json["applicationId"].as_str().expect("id present");
    assert!(id.starts_with("WMCH-"));
    assert_eq!(sheet.rows().len(), 1);
}

#[tokio::test]
async fn submit_route_accepts_text_plain_bodies() {
    let (service, _, sheet, _) = build_service();
    let router = intake_router(Arc::new(service), body_limit());

    let body = serde_json::to_string(&payload()).expect("payload serializes");
    let response = router
        .oneshot(post(body, "text/plain;charset=UTF-8"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sheet.rows().len(), 1);
}

#[tokio::test]
async fn malformed_json_yields_bad_request_with_error_status() {
    let (service, _, sheet, _) = build_service();
    let router = intake_router(Arc::new(service), body_limit());

    let response = router
        .oneshot(post("{\"name\":", "application/json"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = read_json_body(response).await;
    assert_eq!(json["status"], "error");
    assert!(json["message"]
        .as_str()
        .expect("message")
        .starts_with("malformed submission"));
    assert!(sheet.rows().is_empty());
}

#[tokio::test]
async fn decode_failure_is_unprocessable() {
    let (service, _, _, _) = build_service();
    let mut submission = payload();
    submission.files[0].data = "%%%".to_string();

    let response = submit_handler::<MemoryDocuments, MemorySheet, MemoryMailer>(
        State(Arc::new(service)),
        serde_json::to_vec(&submission)
            .expect("payload serializes")
            .into(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn backend_failure_is_internal_error() {
    let service = Arc::new(IntakeService::new(
        Arc::new(MemoryDocuments::default()),
        Arc::new(OfflineSheet),
        Arc::new(MemoryMailer::default()),
        settings(),
    ));

    let response = submit_handler::<MemoryDocuments, OfflineSheet, MemoryMailer>(
        State(service),
        serde_json::to_vec(&payload())
            .expect("payload serializes")
            .into(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = read_json_body(response).await;
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn route_works_with_trait_object_backends() {
    let documents: Arc<dyn crate::intake::DocumentStore> = Arc::new(MemoryDocuments::default());
    let mailer: Arc<dyn crate::intake::Mailer> = Arc::new(MemoryMailer::default());
    let sheet = Arc::new(MemorySheet::default());
    let service = IntakeService::new(documents, sheet.clone(), mailer, settings());
    let router = intake_router(Arc::new(service), body_limit());

    let body = serde_json::to_vec(&payload()).expect("payload serializes");
    let response = router
        .oneshot(post(body, "application/json"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sheet.rows()[0].files.len(), 4);
}

#[test]
fn body_limit_covers_four_encoded_documents_at_the_file_cap() {
    let cap: u64 = 2 * 1024 * 1024;
    let encoded_documents = 4 * 4 * cap.div_ceil(3) as usize;
    assert!(submission_body_limit(cap) > encoded_documents);
    assert!(submission_body_limit(3 * cap) > 3 * encoded_documents);
}

#[tokio::test]
async fn raised_file_cap_admits_larger_submissions() {
    let mut submission = payload();
    submission.files[0].data = "A".repeat(3 * 1024 * 1024);
    let body = serde_json::to_vec(&submission).expect("payload serializes");

    let (service, _, _, _) = build_service();
    let response = intake_router(Arc::new(service), submission_body_limit(256 * 1024))
        .oneshot(post(body.clone(), "application/json"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let (service, documents, _, _) = build_service();
    let response = intake_router(Arc::new(service), submission_body_limit(4 * 1024 * 1024))
        .oneshot(post(body, "application/json"))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(documents.uploads()[0].bytes.len(), 3 * 1024 * 1024 / 4 * 3);
}

#[tokio::test]
async fn route_and_handle_agree_on_failure_payload() {
    let service = Arc::new(IntakeService::new(
        Arc::new(MemoryDocuments::default()),
        Arc::new(OfflineSheet),
        Arc::new(MemoryMailer::default()),
        settings(),
    ));

    let direct = serde_json::to_value(service.handle(payload())).expect("serializes");
    let response = intake_router(service, body_limit())
        .oneshot(post(
            serde_json::to_vec(&payload()).expect("payload serializes"),
            "application/json",
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json_body(response).await, direct);
}
