/*
 * Responsibility
 * - POST /sessions: record a login session for the authorized caller
 * - POST /logout: close the session of the presented access token
 */
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use chrono::Utc;

use crate::api::v1::dto::sessions::{
    CreateSessionRequest, LogoutResponse, MAX_EXPIRES_IN_SECONDS, SessionResponse,
};
use crate::api::v1::extractors::AuthCtxExtractor;
use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::services::{CloseOutcome, SessionMeta};
use crate::state::AppState;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// First hop of x-forwarded-for, then x-real-ip.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}

// Seconds until the token's `exp`, capped at the longest session a client may request.
fn remaining_lifetime(token_expires_at: u64, now: i64) -> i64 {
    i64::try_from(token_expires_at)
        .unwrap_or(i64::MAX)
        .saturating_sub(now)
        .min(MAX_EXPIRES_IN_SECONDS)
}

pub async fn create_session(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    headers: HeaderMap,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_SESSION_REQUEST", msg))?;

    // The guard already accepted this token.
    let access_token = bearer_token(&headers)
        .ok_or_else(|| AppError::unauthorized("MISSING_TOKEN", "Missing token"))?
        .to_string();

    let expires_in = req
        .expires_in
        .unwrap_or_else(|| remaining_lifetime(ctx.token_expires_at, Utc::now().timestamp()));

    let meta = SessionMeta {
        access_token,
        refresh_token: req.refresh_token,
        expires_in,
        ip_address: client_ip(&headers),
        user_agent: header_str(&headers, header::USER_AGENT.as_str()),
    };

    let session = state.sessions.open(ctx.identity_id, meta).await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, AppError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::unauthorized("MISSING_TOKEN", "Missing token"))?;

    match state.sessions.close(token, Utc::now()).await? {
        outcome @ (CloseOutcome::Closed | CloseOutcome::AlreadyClosed) => Ok(Json(LogoutResponse {
            message: "Logout successful",
            outcome: outcome.as_str(),
        })),
        CloseOutcome::Expired => Err(AppError::unauthorized(
            "SESSION_EXPIRED",
            "Session already expired",
        )),
        CloseOutcome::NotFound => Err(AppError::unauthorized(
            "SESSION_NOT_FOUND",
            "No session for this token",
        )),
    }
}
