//! Liveness endpoint for the supervising process.

use crate::shutdown::Shutdown;
use crate::state::PollStatus;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_poll: Option<DateTime<Utc>>,
    pub polls_total: u64,
}

async fn health(State(status): State<Arc<PollStatus>>) -> Json<HealthResponse> {
    let snapshot = status.snapshot();
    Json(HealthResponse {
        status: "ok",
        last_poll: snapshot.last_poll,
        polls_total: snapshot.polls_total,
    })
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn router(status: Arc<PollStatus>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(status)
}

/// Serve the health endpoint until the shutdown token trips.
pub async fn serve(port: u16, status: Arc<PollStatus>, shutdown: Shutdown) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind health port {port}"))?;
    tracing::info!(port, "healthcheck server listening");
    axum::serve(listener, router(status))
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await
        .context("health server failed")
}
