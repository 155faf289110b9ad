//! Delivery-zone admin service.
//!
//! Mirrors the provider's delivery zones into the relational hierarchy and
//! exposes the import pipeline, staging review, coverage audit and operation
//! history over HTTP.

mod config;

use axum::{routing::get, Json, Router};
use config::Config;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use zonesync_api_pipeline::{pipeline_router, PipelineState};
use zonesync_db::{run_migrations, DbPool};
use zonesync_navio::{NavioClient, NavioConfig};
use zonesync_pipeline::classify::{ClassifierConfig, HttpClassifier};

#[tokio::main]
async fn main() {
    // Fail fast on missing or invalid configuration.
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    if let Err(e) = run(config).await {
        tracing::error!("Fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let pool = DbPool::connect_with(&config.database_url, config.db_max_connections).await?;
    run_migrations(pool.inner()).await?;
    info!("Database connected, migrations applied");

    let navio = NavioClient::new(NavioConfig::new(
        config.navio_api_url.clone(),
        config.navio_api_key.clone(),
    ))?;
    let classifier = Arc::new(HttpClassifier::new(ClassifierConfig {
        endpoint: config.classifier_url.clone(),
        api_key: config.classifier_api_key.clone(),
        timeout_secs: 60,
    })?);

    let state = PipelineState::new(
        pool.inner().clone(),
        navio,
        classifier,
        config.retry.clone(),
        config.coverage.clone(),
    );

    let app = Router::new()
        .route("/health", get(health))
        .merge(pipeline_router(state));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Resolves when ctrl-c (or SIGTERM on unix) is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
