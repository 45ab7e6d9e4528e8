use crate::config::ApiConfig;
use crate::service::{HttpResponse, PatientService};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Method,
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use std::collections::HashMap;
use std::future::Future;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the API router.
///
/// Method dispatch is left to [`PatientService::handle_request`], so the
/// patient routes accept any method and the service answers 405 itself.
pub fn create_router(service: PatientService) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/patients", any(patients))
        .route("/patients/:id", any(patient_by_id))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "registry-service"
    }))
}

async fn patients(
    State(service): State<PatientService>,
    method: Method,
    body: Bytes,
) -> impl IntoResponse {
    dispatch(&service, &method, &HashMap::new(), &body).await
}

async fn patient_by_id(
    State(service): State<PatientService>,
    method: Method,
    Path(params): Path<HashMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    dispatch(&service, &method, &params, &body).await
}

async fn dispatch(
    service: &PatientService,
    method: &Method,
    params: &HashMap<String, String>,
    body: &Bytes,
) -> HttpResponse {
    service
        .handle_request(method.as_str(), params, Some(body.as_ref()))
        .await
}

/// Serve the router on the configured address until `shutdown` resolves
pub async fn start_api_server(
    service: PatientService,
    config: &ApiConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(service);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting patient registry API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}

/// Run the router under the Lambda runtime, one invocation per request
pub async fn run_lambda(service: PatientService) -> Result<()> {
    info!("Starting patient registry under the Lambda runtime");

    lambda_http::run(create_router(service))
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Lambda runtime error")
}
