//! HTTP surface: `GET /rss` and `GET /atom`, both taking `?auth=<credential>`.

mod error;
mod routes;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::service::MergeService;

pub use error::AppError;

/// Shared handler state; one service (and so one cache) per process.
pub type AppState = Arc<MergeService>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/rss", get(routes::rss_feed))
        .route("/atom", get(routes::atom_feed))
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, service: MergeService) -> std::io::Result<()> {
    let app = create_router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Without a signal handler, run until the process is killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
