/*
 * Responsibility
 * - GET /api/health, /api/health/live, /api/health/ready
 * - No authentication; readiness returns 503 while a dependency is down
 */
use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::api::dto::health::{LivenessResponse, ReadinessResponse};
use crate::state::AppState;

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn health_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": format!("{} Health Module", state.app_name),
        "message": "Check /live or /ready for status.",
        "version": state.app_version,
        "timestamp_utc": timestamp(),
        "endpoints": {
            "/live": "Liveness probe: the process is running.",
            "/ready": "Readiness probe: the process and its databases can serve requests."
        },
        "status": "HEALTH_API_ROOT_UP"
    }))
}

pub async fn live(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        service: state.app_name.clone(),
        status: "UP",
        version: state.app_version.clone(),
        timestamp_utc: timestamp(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        message: "Application is live and responsive.",
    })
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let (report, cached) = state.health.readiness().await;

    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        tracing::warn!(status = ?report.status, "readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadinessResponse {
        service: state.app_name.clone(),
        status: report.status,
        version: state.app_version.clone(),
        timestamp_utc: timestamp(),
        response_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cached,
        components: report.components,
    };

    (status, Json(body))
}
