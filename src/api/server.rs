use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::services::{batch_submit, get_status, health, queue_status, query, stats, submit};
use super::state::AppState;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Assembles the HTTP surface (spec §6) over an already-constructed
/// [`AppState`]. Split from [`run`] so tests can mount the router without
/// binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(submit).get(query))
        .route("/jobs/batch", post(batch_submit))
        .route("/jobs/{job_id}", get(get_status))
        .route("/stats", get(stats))
        .route("/queue", get(queue_status))
        .route("/health", get(health))
        .with_state(state)
        .layer(RequestDecompressionLayer::new())
}

pub async fn run(address: SocketAddr, state: AppState) -> Result<(), AnyError> {
    let dispatcher = state.dispatcher.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "imagegate listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown().await;
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
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
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
