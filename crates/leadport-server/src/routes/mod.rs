//! Route handlers, grouped by audience.

pub mod admin;
pub mod auth;
pub mod billing;
pub mod leads;

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
