//! Transport layers shared by every route.
//!
//! - `x-request-id`: generated when absent, echoed on the response
//! - access log via `TraceLayer`
//! - small body limit (session metadata is the largest payload)
//! - request deadline derived from the store timeout; expiry answers with the
//!   usual JSON error envelope

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::header::HeaderName;
use axum::response::{IntoResponse, Response};
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppError;

const BODY_LIMIT_BYTES: usize = 64 * 1024;
// One decision touches the identity, role and audit stores in sequence.
const STORE_CALLS_PER_REQUEST: u32 = 4;
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

fn request_timeout(config: &Config) -> Duration {
    config
        .store_timeout
        .checked_mul(STORE_CALLS_PER_REQUEST)
        .unwrap_or(MAX_REQUEST_TIMEOUT)
        .clamp(MIN_REQUEST_TIMEOUT, MAX_REQUEST_TIMEOUT)
}

async fn handle_layer_error(err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        tracing::error!("request deadline exceeded");
        AppError::ServiceUnavailable.into_response()
    } else {
        tracing::error!(error = %err, "unhandled middleware error");
        AppError::Internal.into_response()
    }
}

pub fn apply(router: Router, config: &Config) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_layer_error))
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(PropagateRequestIdLayer::new(request_id))
            .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
            .layer(TimeoutLayer::new(request_timeout(config)))
            .layer(TraceLayer::new_for_http()),
    )
}
