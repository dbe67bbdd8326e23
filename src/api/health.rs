//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::broadcast::{DispatcherStatsSnapshot, RemediatorStatsSnapshot};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub directory_backend: String,
    pub pending_confirmations: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub submissions: DispatcherStatsSnapshot,
    pub remediation: RemediatorStatsSnapshot,
    pub pending_confirmations: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        directory_backend: state.settings.database.backend.clone(),
        pending_confirmations: state.confirmation_queue.len().await,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        submissions: state.dispatcher.stats(),
        remediation: state.remediator.stats(),
        pending_confirmations: state.confirmation_queue.len().await,
    })
}
