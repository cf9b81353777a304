//! CORS policy for browser clients of the data API.
//!
//! - Development: any origin, no credentials.
//! - Production: exact-match allow-list from `CORS_ALLOWED_ORIGINS`. An empty
//!   list emits no CORS headers at all.
//!
//! Bearer tokens travel in `Authorization`, never in cookies, so credentials
//! mode is never enabled.
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;

pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config.app_env.is_production(), &config.cors_allowed_origins))
}

fn layer(is_production: bool, allowed_origins: &[String]) -> CorsLayer {
    let base = if is_production {
        let allowed: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        if allowed.len() != allowed_origins.len() {
            tracing::warn!("ignoring unparsable entries in CORS_ALLOWED_ORIGINS");
        }
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
    } else {
        CorsLayer::new().allow_origin(Any)
    };

    base.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-process-time"),
        ])
        .max_age(Duration::from_secs(600))
}
