/*
 * Responsibility
 * - GET / (public service descriptor)
 */
use std::collections::BTreeMap;

use axum::{Json, extract::State};

use crate::api::dto::health::{RootLinks, RootResponse};
use crate::state::AppState;

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let modules = BTreeMap::from([
        ("authentication", "/api/auth/me"),
        ("health", "/api/health"),
    ]);

    Json(RootResponse {
        service: state.app_name.clone(),
        message: "Welcome to the SQES Data API.",
        version: state.app_version.clone(),
        status: "API_UP",
        links: RootLinks { modules },
    })
}
