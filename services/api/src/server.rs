use crate::cli::ServeArgs;
use crate::infra::{intake_backends, AppState};
use crate::routes::with_service_routes;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::intake::{intake_router, submission_body_limit};
use admissions::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backends = intake_backends(&config).await?;
    let setup_service = backends.service.clone();
    match tokio::task::spawn_blocking(move || setup_service.setup()).await {
        Ok(Ok(true)) => info!("application sheet initialised"),
        Ok(Ok(false)) => {}
        Ok(Err(err)) => return Err(err.into()),
        Err(err) => warn!(error = %err, "sheet setup task did not complete"),
    }

    let body_limit = submission_body_limit(config.apply.max_file_bytes);
    let intake = intake_router(backends.service, body_limit);
    let app = with_service_routes(intake, backends.local_files)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, institution = %config.intake.institution, "admissions intake ready");

    axum::serve(listener, app).await?;
    Ok(())
}
