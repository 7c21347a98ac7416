pub mod auth;
pub mod cutoffs;
pub mod transfers;
pub mod webhook;

use axum::{response::IntoResponse, Json};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
