use anyhow::{Context, Result};
use registry_service::{
    run_lambda, start_api_server, Config, DynamoDbRecordStore, InMemoryRecordStore,
    PatientService, RecordStore, S3UploadAuthorizer, StoreBackend,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting OncoVision Patient Registry"
    );

    let store: Arc<dyn RecordStore> = match config.store.backend {
        StoreBackend::Dynamodb => Arc::new(
            DynamoDbRecordStore::new(&config.store)
                .await
                .context("Failed to initialize DynamoDB record store")?,
        ),
        StoreBackend::Memory => {
            warn!("Using in-memory record store, records are lost on exit");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    let authorizer = Arc::new(
        S3UploadAuthorizer::new(&config.s3)
            .await
            .context("Failed to initialize S3 upload authorizer")?,
    );

    let service = PatientService::new(store, authorizer, config.upload_url_expiry());

    if std::env::var_os("AWS_LAMBDA_RUNTIME_API").is_some() {
        return run_lambda(service).await;
    }

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    start_api_server(service, &config.api, shutdown_signal()).await?;

    info!("Patient registry stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
