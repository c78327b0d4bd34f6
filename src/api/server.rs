use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{health, ingest_payload, stats},
    state::AppState,
};
use crate::runtime::PipelineRuntime;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Runs the scrape-intake HTTP surface (`pipeline serve-api`). Does not
/// spawn any of the stage workers itself — those run under `pipeline
/// worker --queue <name>`, independently scalable from the API process.
pub async fn run(address: SocketAddr, runtime: Arc<PipelineRuntime>) -> Result<(), AnyError> {
    let state = AppState::new(runtime);

    let app = Router::new()
        .route("/payloads", post(ingest_payload))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestDecompressionLayer::new());

    let listener = TcpListener::bind(address).await?;
    info!(%address, "pipeline API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
