//! Health check handler

use axum::{extract::State, response::Response};
use chrono::Utc;
use serde::Serialize;

use crate::web::{AppState, responses::ok};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Liveness probe
pub async fn health_check(State(state): State<AppState>) -> Response {
    let now = Utc::now();
    ok(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: now.signed_duration_since(state.started_at).num_seconds(),
        timestamp: now,
    })
}
