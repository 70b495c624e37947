//! Health probe HTTP server.
//!
//! - `/healthz`: the process is alive
//! - `/readyz`: fencing is armed, or deliberately suspended for maintenance
//! - `/status`: the latest [`SupervisorStatus`] as JSON

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::supervisor::SupervisorStatus;

type StatusReceiver = watch::Receiver<SupervisorStatus>;

/// Routes served by the health probe server.
pub fn router(status: StatusReceiver) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/status", get(status_handler))
        .with_state(status)
}

/// Serve health probes on `addr` until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    status: StatusReceiver,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health probe server to {addr}"))?;
    info!(%addr, "Health probe server listening");

    axum::serve(listener, router(status))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("Health probe server error")?;

    info!("Health probe server stopped");
    Ok(())
}

async fn healthz_handler() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn readyz_handler(State(status): State<StatusReceiver>) -> Response {
    if status.borrow().is_ready() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn status_handler(State(status): State<StatusReceiver>) -> Response {
    let snapshot = *status.borrow();
    Json(snapshot).into_response()
}
