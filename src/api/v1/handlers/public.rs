use axum::Json;
use serde_json::{Value, json};

pub async fn public() -> Json<Value> {
    Json(json!({"message": "This is a public endpoint."}))
}
