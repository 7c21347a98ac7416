use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{models::Transaction, queries};
use crate::domain::TransferStatus;
use crate::error::AppError;
use crate::spei::{CancelOutcome, PaymentNetwork, PlaceOrderRequest, SpeiError};
use crate::validation;

/// Read-only answer to "would a cancel currently succeed?".
#[derive(Debug, Serialize)]
pub struct CancelEligibility {
    pub cancelable: bool,
    pub seconds_remaining: i64,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TransferStatus,
}

#[derive(Debug, Serialize)]
pub struct CancelReceipt {
    pub transaction: Transaction,
    pub canceled_at: DateTime<Utc>,
}

pub struct TransferService {
    pool: PgPool,
    spei: Arc<dyn PaymentNetwork>,
}

impl TransferService {
    pub fn new(pool: PgPool, spei: Arc<dyn PaymentNetwork>) -> Self {
        Self { pool, spei }
    }

    /// Creates a transfer in its grace period and places the order on the
    /// rail. Placement is best-effort here; the dispatch sweep retries rows
    /// left without an order reference.
    pub async fn create(
        &self,
        company_id: Uuid,
        beneficiary_name: &str,
        beneficiary_account: &str,
        amount_cents: i64,
    ) -> Result<Transaction, AppError> {
        validation::validate_beneficiary_name(beneficiary_name)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_clabe(beneficiary_account)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        validation::validate_positive_amount(amount_cents)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let row = Transaction::new(
            company_id,
            validation::sanitize_string(beneficiary_name),
            validation::sanitize_string(beneficiary_account),
            amount_cents,
        );
        let mut inserted = queries::insert_transaction(&self.pool, &row).await?;

        match self.place_order(&inserted).await {
            Ok(order_ref) => {
                queries::set_order_ref(&self.pool, inserted.id, &order_ref).await?;
                inserted.order_ref = Some(order_ref);
            }
            Err(e) => {
                tracing::warn!(transfer = %inserted.id, "order placement failed, sweep will retry: {}", e);
            }
        }

        Ok(inserted)
    }

    /// User-initiated cancel. The decision is a single conditional update in
    /// the store; the network leg runs only after the local cancel committed
    /// and can never revert it.
    pub async fn cancel(&self, id: Uuid, actor: &str) -> Result<CancelReceipt, AppError> {
        let canceled = queries::cancel_transaction(&self.pool, id, actor).await?;

        let Some(transaction) = canceled else {
            return Err(self.explain_cancel_failure(id).await?);
        };

        if let Some(order_ref) = transaction.order_ref.clone() {
            match self.spei.cancel_order(&order_ref).await {
                Ok(CancelOutcome::Accepted) => {
                    tracing::info!(transfer = %id, order = %order_ref, "network cancel accepted");
                }
                Ok(CancelOutcome::Rejected(detail)) => {
                    // Local cancel stands; record the discrepancy for ops.
                    tracing::warn!(transfer = %id, order = %order_ref, "network cancel rejected: {}", detail);
                    queries::append_status_detail(
                        &self.pool,
                        id,
                        &format!("network cancel rejected: {}", detail),
                    )
                    .await?;
                }
                Err(e) => {
                    tracing::warn!(transfer = %id, order = %order_ref, "network cancel failed: {}", e);
                    queries::append_status_detail(
                        &self.pool,
                        id,
                        &format!("network cancel failed: {}", e),
                    )
                    .await?;
                }
            }
        }

        let canceled_at = transaction.updated_at;
        Ok(CancelReceipt {
            transaction,
            canceled_at,
        })
    }

    /// Read-only eligibility check. Tolerates a passed deadline by clamping
    /// seconds remaining at zero.
    pub async fn can_cancel(&self, id: Uuid) -> Result<CancelEligibility, AppError> {
        let transaction = queries::get_transaction(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transfer {} not found", id)))?;

        let now = Utc::now();
        let eligibility = match (transaction.status, transaction.confirmation_deadline) {
            (TransferStatus::PendingConfirmation, Some(deadline)) => {
                let seconds_remaining = (deadline - now).num_seconds().max(0);
                CancelEligibility {
                    cancelable: now < deadline,
                    seconds_remaining,
                    deadline: Some(deadline),
                    status: transaction.status,
                }
            }
            (status, _) => CancelEligibility {
                cancelable: false,
                seconds_remaining: 0,
                deadline: None,
                status,
            },
        };

        Ok(eligibility)
    }

    /// Periodic sweep: retries order placement for rows that missed it, then
    /// transitions every expired grace-period row to `sent`.
    pub async fn dispatch_due(&self) -> Result<usize, AppError> {
        for transaction in queries::transfers_awaiting_order(&self.pool).await? {
            match self.place_order(&transaction).await {
                Ok(order_ref) => {
                    queries::set_order_ref(&self.pool, transaction.id, &order_ref).await?;
                }
                Err(e) => {
                    tracing::warn!(transfer = %transaction.id, "order placement retry failed: {}", e);
                }
            }
        }

        let sent = queries::mark_due_transfers_sent(&self.pool).await?;
        if !sent.is_empty() {
            tracing::info!("dispatched {} transfers past their grace period", sent.len());
        }

        Ok(sent.len())
    }

    async fn place_order(&self, transaction: &Transaction) -> Result<String, SpeiError> {
        let placed = self
            .spei
            .place_order(&PlaceOrderRequest {
                transaction_id: transaction.id,
                beneficiary_name: transaction.beneficiary_name.clone(),
                beneficiary_account: transaction.beneficiary_account.clone(),
                amount_cents: transaction.amount_cents,
            })
            .await?;

        Ok(placed.order_ref)
    }

    /// The cancel CAS matched nothing; re-read to report exactly why.
    async fn explain_cancel_failure(&self, id: Uuid) -> Result<AppError, AppError> {
        let Some(current) = queries::get_transaction(&self.pool, id).await? else {
            return Ok(AppError::NotFound(format!("Transfer {} not found", id)));
        };

        let error = match current.status {
            TransferStatus::PendingConfirmation => AppError::Conflict(format!(
                "grace period expired (status: {})",
                current.status
            )),
            TransferStatus::Canceled => {
                AppError::Conflict(format!("already canceled (status: {})", current.status))
            }
            TransferStatus::Sent | TransferStatus::Scattered | TransferStatus::Returned => {
                AppError::Conflict(format!(
                    "transfer already dispatched (status: {})",
                    current.status
                ))
            }
        };

        Ok(error)
    }
}
