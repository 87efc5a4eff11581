//! CORS for browser clients calling the gate directly.
//!
//! - Development: any origin, no credentials.
//! - Production: exact origins from `CORS_ALLOWED_ORIGINS`; an empty list admits none.
//! - Only the verbs the gate serves (GET, POST) plus preflight.
//! - `x-request-id` is exposed so browser clients can quote it when reporting a denial.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

fn allowed_origins(config: &Config) -> AllowOrigin {
    if !config.app_env.is_production() {
        return AllowOrigin::from(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) if origin != "*" => Some(v),
            _ => {
                tracing::warn!(origin = %origin, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    AllowOrigin::list(origins)
}

pub fn layer(config: &Config) -> CorsLayer {
    let request_id = HeaderName::from_static("x-request-id");

    // Credentials stay off: wildcard origins and credentials must never combine.
    CorsLayer::new()
        .allow_origin(allowed_origins(config))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            request_id.clone(),
        ])
        .expose_headers([request_id])
        .max_age(PREFLIGHT_MAX_AGE)
}

pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config))
}
