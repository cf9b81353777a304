//! Per-route authorization gate.
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{Decision, Identity, Requirement, authorize};
use crate::state::AppState;

/// Guard every route already registered on `router` with `requirement`.
///
/// Must sit inside `access::apply` so the identity is present.
pub fn apply(router: Router<AppState>, requirement: Requirement) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        Arc::new(requirement),
        require_middleware,
    ))
}

async fn require_middleware(
    State(requirement): State<Arc<Requirement>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // No identity means the access layer was not mounted; fail closed.
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(AppError::MissingCredentials)?;

    match authorize(identity, &requirement) {
        Decision::Allow => Ok(next.run(req).await),
        Decision::Deny(reason) => {
            tracing::warn!(
                subject_id = identity.subject_id(),
                reason = reason.as_str(),
                ?requirement,
                path = %req.uri().path(),
                "authorization denied"
            );
            Err(AppError::Auth(reason.into()))
        }
    }
}
