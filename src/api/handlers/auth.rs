/*
 * Responsibility
 * - /api/auth handlers
 * - Requirements are enforced by middleware before these run; set_user_role
 *   additionally goes through the claims mutator's own check
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::api::dto::auth::{
    AccountStatusResponse, IdentityResponse, SetUserRoleRequest, SetUserRoleResponse,
};
use crate::api::extractors::CurrentIdentity;
use crate::error::AppError;
use crate::state::AppState;

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<IdentityResponse> {
    tracing::info!(
        subject_id = identity.subject_id(),
        roles = ?identity.roles(),
        "current identity requested"
    );
    Json(IdentityResponse::from(&identity))
}

pub async fn my_status(CurrentIdentity(identity): CurrentIdentity) -> Json<AccountStatusResponse> {
    Json(AccountStatusResponse {
        uid: identity.subject_id().to_string(),
        disabled: identity.disabled(),
        email_verified: identity.email_verified(),
    })
}

pub async fn set_user_role(
    State(state): State<AppState>,
    CurrentIdentity(caller): CurrentIdentity,
    body: Result<Json<SetUserRoleRequest>, JsonRejection>,
) -> Result<Json<SetUserRoleResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::bad_request("invalid_body", e.body_text()))?;
    let (target, roles) = req
        .validate()
        .map_err(|msg| AppError::bad_request("invalid_request", msg))?;

    let change = state.mutator.set_claims(&caller, &target, &roles).await?;

    Ok(Json(change.into()))
}
