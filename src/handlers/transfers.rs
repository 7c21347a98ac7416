use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::TransferService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub company_id: Uuid,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub amount_cents: i64,
}

fn service(state: &AppState) -> TransferService {
    TransferService::new(state.db.clone(), state.spei.clone())
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransferRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = service(&state)
        .create(
            payload.company_id,
            &payload.beneficiary_name,
            &payload.beneficiary_account,
            payload.amount_cents,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = crate::db::queries::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {} not found", id)))?;

    Ok(Json(transaction))
}

pub async fn cancel_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = service(&state).cancel(id, "user").await?;

    Ok(Json(json!({
        "id": receipt.transaction.id,
        "status": receipt.transaction.status,
        "canceled_at": receipt.canceled_at,
    })))
}

pub async fn cancel_eligibility(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let eligibility = service(&state).can_cancel(id).await?;

    Ok(Json(eligibility))
}
