use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::services::webhook::{OrderStatusNotification, WebhookOutcome};
use crate::services::WebhookService;
use crate::AppState;

pub const ORDER_STATUS_TYPE: &str = "orden.status";

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: OrderStatusNotification,
    pub signature: String,
}

/// Order-status webhook. Acknowledges with the received order ref and status
/// whenever the payload is well-formed and well-signed; correlation failures
/// are logged, never surfaced, so the sender's redelivery loop is not fed by
/// our internal state.
pub async fn order_status(
    State(state): State<AppState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<impl IntoResponse, AppError> {
    if envelope.kind != ORDER_STATUS_TYPE {
        return Err(AppError::Validation(format!(
            "unsupported webhook type: {}",
            envelope.kind
        )));
    }

    let service = WebhookService::new(
        state.db.clone(),
        state.verifier.clone(),
        state.config.transfer_fee_cents,
    );

    service.verify(&envelope.data, &envelope.signature)?;
    let outcome = service.apply(&envelope.data).await?;

    let applied = matches!(outcome, WebhookOutcome::Applied(_));
    Ok(Json(json!({
        "received": {
            "order_ref": envelope.data.order_ref,
            "status": envelope.data.status,
        },
        "applied": applied,
    })))
}
