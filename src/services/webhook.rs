use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db::audit::{AuditLog, ENTITY_TRANSFER};
use crate::db::models::{Commission, Transaction};
use crate::db::queries;
use crate::domain::TransferStatus;
use crate::error::AppError;
use crate::spei::{canonical_string, SignatureError, WebhookVerifier};

/// Order-status notification as delivered by the rail: at-least-once,
/// possibly out of order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusNotification {
    pub order_ref: String,
    pub status: TransferStatus,
    pub detail: Option<String>,
}

#[derive(Debug)]
pub enum WebhookOutcome {
    Applied(Transaction),
    /// Same status already recorded; redelivery is a no-op.
    Duplicate,
    /// The stored status does not admit this transition (terminal row, or a
    /// cancel already won). Logged and audited, never applied.
    Rejected { current: TransferStatus },
    /// No local transfer carries this order reference.
    Uncorrelated,
}

pub struct WebhookService {
    pool: PgPool,
    verifier: WebhookVerifier,
    transfer_fee_cents: i64,
}

impl WebhookService {
    pub fn new(pool: PgPool, verifier: WebhookVerifier, transfer_fee_cents: i64) -> Self {
        Self {
            pool,
            verifier,
            transfer_fee_cents,
        }
    }

    /// Recomputes the canonical string and checks the network signature.
    pub fn verify(
        &self,
        notification: &OrderStatusNotification,
        signature: &str,
    ) -> Result<(), AppError> {
        let canonical = canonical_string(
            &notification.order_ref,
            notification.status,
            notification.detail.as_deref(),
        );

        self.verifier.verify(&canonical, signature).map_err(|e| match e {
            SignatureError::SignatureMismatch | SignatureError::InvalidSignatureFormat => {
                tracing::warn!(order = %notification.order_ref, "webhook signature rejected: {}", e);
                AppError::Unauthorized("invalid webhook signature".to_string())
            }
            SignatureError::InvalidKey(detail) => AppError::Internal(detail),
        })
    }

    /// Applies a verified notification. Duplicates are no-ops; retrograde
    /// transitions are refused and audited as suspicious.
    pub async fn apply(
        &self,
        notification: &OrderStatusNotification,
    ) -> Result<WebhookOutcome, AppError> {
        match notification.status {
            TransferStatus::PendingConfirmation => {
                return Err(AppError::Validation(
                    "pending_confirmation is not a network status".to_string(),
                ));
            }
            TransferStatus::Sent
            | TransferStatus::Scattered
            | TransferStatus::Returned
            | TransferStatus::Canceled => {}
        }

        let Some(transaction) =
            queries::get_transaction_by_order_ref(&self.pool, &notification.order_ref).await?
        else {
            tracing::warn!(
                order = %notification.order_ref,
                status = %notification.status,
                "webhook for unknown order reference"
            );
            return Ok(WebhookOutcome::Uncorrelated);
        };

        let mut db_tx = self.pool.begin().await?;

        let updated = queries::update_status_if_active(
            &mut db_tx,
            transaction.id,
            notification.status,
            notification.detail.as_deref(),
        )
        .await?;

        let Some(updated) = updated else {
            db_tx.rollback().await?;
            return self.explain_skipped(&transaction, notification).await;
        };

        AuditLog::log_status_change(
            &mut db_tx,
            updated.id,
            ENTITY_TRANSFER,
            transaction.status.as_str(),
            updated.status.as_str(),
            "webhook",
        )
        .await?;

        // Accrual hook: a scattered transfer earns its commission in the same
        // database transaction as the status change.
        if updated.status == TransferStatus::Scattered {
            let commission = Commission::accrue(
                updated.company_id,
                updated.id,
                self.transfer_fee_cents,
            );
            queries::insert_commission(&mut db_tx, &commission).await?;
        }

        db_tx.commit().await?;

        tracing::info!(
            transfer = %updated.id,
            order = %notification.order_ref,
            status = %updated.status,
            "webhook status applied"
        );

        Ok(WebhookOutcome::Applied(updated))
    }

    /// The conditional update matched nothing: either a redelivery of the
    /// recorded status, or a transition the state machine refuses.
    async fn explain_skipped(
        &self,
        before: &Transaction,
        notification: &OrderStatusNotification,
    ) -> Result<WebhookOutcome, AppError> {
        let current = queries::get_transaction(&self.pool, before.id)
            .await?
            .map(|t| t.status)
            .unwrap_or(before.status);

        if current == notification.status {
            tracing::info!(
                transfer = %before.id,
                status = %current,
                "duplicate webhook delivery ignored"
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        tracing::warn!(
            transfer = %before.id,
            current = %current,
            incoming = %notification.status,
            "webhook transition refused"
        );

        let mut db_tx = self.pool.begin().await?;
        AuditLog::record(
            &mut db_tx,
            before.id,
            ENTITY_TRANSFER,
            "webhook_transition_refused",
            serde_json::json!({
                "current": current.as_str(),
                "incoming": notification.status.as_str(),
                "order_ref": notification.order_ref,
            }),
            "webhook",
        )
        .await?;
        db_tx.commit().await?;

        Ok(WebhookOutcome::Rejected { current })
    }
}
