use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::services::ResetTokenService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetComplete {
    pub token: String,
    pub new_password: String,
}

const GENERIC_REQUEST_ACK: &str =
    "If the address exists, a reset link has been sent";

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// First phase: issues a token bound to the email and requesting IP. The
/// response is identical whether or not the account exists.
pub async fn request_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let service = ResetTokenService::new(state.db.clone());

    if let Some(issued) = service.issue(&payload.email, &client_ip(&headers)).await? {
        // Delivery is the mail sink's job; the token must not appear in
        // the response or the logs.
        tracing::info!(expires_at = %issued.expires_at, "reset token issued");
    }

    Ok(Json(json!({ "message": GENERIC_REQUEST_ACK })))
}

/// Second phase: consumes the token and stores the new password.
pub async fn complete_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetComplete>,
) -> Result<impl IntoResponse, AppError> {
    let service = ResetTokenService::new(state.db.clone());
    service
        .complete_reset(&payload.token, &payload.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password updated" })))
}
