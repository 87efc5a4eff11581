/*
 * Responsibility
 * - GET /protected, mounted behind MANAGE_USERS
 */
use axum::Json;
use serde_json::{Value, json};

use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn protected(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<Value> {
    Json(json!({
        "message": "You have access to protected data!",
        "identity_id": ctx.identity_id,
    }))
}
