//! Bearer credential → `Identity` in request extensions.
use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::credential::{bearer_token, fingerprint};
use crate::state::AppState;

/// Authenticate every route already registered on `router`.
///
/// Uses `route_layer` so unmatched paths still 404 instead of 401.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or(AppError::MissingCredentials)?
        .to_owned();

    let identity = match state.auth.authenticate(&token).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(
                credential = %fingerprint(&token),
                error = err.code(),
                path = %req.uri().path(),
                "authentication failed"
            );
            return Err(err.into());
        }
    };

    // middleware → extractor
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
