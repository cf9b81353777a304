/*
 * Responsibility
 * - URL layout of the gateway
 * - Which Requirement guards which route (declared here, statically)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{auth, health, root::root};
use crate::middleware::auth::{access, require};
use crate::services::auth::Requirement;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .merge(health_routes())
        .nest("/api/auth", auth_routes(state))
}

// Public probes; both spellings of the module root are accepted.
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health::health_root))
        .route("/api/health/", get(health::health_root))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    let me = require::apply(
        Router::new().route("/me", get(auth::me)),
        Requirement::Authenticated,
    );
    let status = require::apply(
        Router::new().route("/me/status", get(auth::my_status)),
        Requirement::OwnStatus,
    );
    let admin = require::apply(
        Router::new().route("/set-user-role", post(auth::set_user_role)),
        state.admin_requirement.clone(),
    );

    access::apply(me.merge(status).merge(admin), state)
}
