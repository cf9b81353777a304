/*
 * Responsibility
 * - Application-wide AppError
 * - IntoResponse (HTTP status / JSON error envelope)
 * - Re-classifies AuthError and validation failures into one response shape
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::AuthError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("missing bearer credentials")]
    MissingCredentials,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("request timed out")]
    RequestTimeout,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            "Invalid authentication credentials.".into(),
        ),
        AuthError::ExpiredToken => (
            StatusCode::UNAUTHORIZED,
            "Authentication credentials have expired.".into(),
        ),
        AuthError::InconsistentIdentity(_) => (
            StatusCode::UNAUTHORIZED,
            "Token and profile do not describe the same identity.".into(),
        ),
        AuthError::AccountDisabled => (
            StatusCode::FORBIDDEN,
            "User account is disabled.".into(),
        ),
        AuthError::InsufficientScope { required } => (
            StatusCode::FORBIDDEN,
            match required {
                Some(entry) => format!("Requires '{entry}'."),
                None => "Operation not permitted.".into(),
            },
        ),
        AuthError::ProfileNotFound => (
            StatusCode::CONFLICT,
            "User profile not found; complete your registration.".into(),
        ),
        AuthError::TargetNotFound => (
            StatusCode::NOT_FOUND,
            "User not found for the provided uid or email.".into(),
        ),
        AuthError::ServiceUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Authentication backend temporarily unavailable.".into(),
        ),
    }
}

fn www_authenticate(err: &AuthError) -> Option<HeaderValue> {
    match err {
        AuthError::InvalidToken | AuthError::InconsistentIdentity(_) => Some(
            HeaderValue::from_static(r#"Bearer error="invalid_token""#),
        ),
        AuthError::ExpiredToken => Some(HeaderValue::from_static(
            r#"Bearer error="invalid_token", error_description="token expired""#,
        )),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut challenge = None;
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::MissingCredentials => {
                challenge = Some(HeaderValue::from_static("Bearer"));
                (
                    StatusCode::UNAUTHORIZED,
                    "missing_credentials",
                    "Bearer credentials are required.".into(),
                )
            }
            AppError::Auth(err) => {
                challenge = www_authenticate(&err);
                let (status, message) = auth_status(&err);
                (status, err.code(), message)
            }
            AppError::RequestTimeout => (
                StatusCode::REQUEST_TIMEOUT,
                "request_timeout",
                "The request took too long to complete.".into(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_server_error",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(value) = challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}
