use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{TransferStatus, GRACE_PERIOD_SECS};

/// One outgoing transfer. Amounts are fixed-point centavos.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub company_id: Uuid,
    pub beneficiary_name: String,
    /// CLABE of the beneficiary. Data field only, validated for shape.
    pub beneficiary_account: String,
    pub amount_cents: i64,
    pub status: TransferStatus,
    /// Order id on the payment network, set once the order is placed.
    pub order_ref: Option<String>,
    /// Set iff status == pending_confirmation.
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub status_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        company_id: Uuid,
        beneficiary_name: String,
        beneficiary_account: String,
        amount_cents: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            beneficiary_name,
            beneficiary_account,
            amount_cents,
            status: TransferStatus::PendingConfirmation,
            order_ref: None,
            confirmation_deadline: Some(now + Duration::seconds(GRACE_PERIOD_SECS)),
            status_detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fee accrued against one scattered transfer, owned by one company.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Commission {
    pub id: Uuid,
    pub company_id: Uuid,
    pub transaction_id: Uuid,
    pub amount_cents: i64,
    pub accrued_at: DateTime<Utc>,
    /// Once set the row is immutable.
    pub cutoff_id: Option<Uuid>,
}

impl Commission {
    pub fn accrue(company_id: Uuid, transaction_id: Uuid, amount_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            transaction_id,
            amount_cents,
            accrued_at: Utc::now(),
            cutoff_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CutoffStatus {
    Processing,
    Completed,
    Failed,
}

/// Result of one cutoff batch run for one company.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionCutoff {
    pub id: Uuid,
    pub company_id: Uuid,
    pub total_amount_cents: i64,
    pub commission_count: i32,
    pub status: CutoffStatus,
    pub cutoff_date: NaiveDate,
    /// Identifier returned by the payment network on successful submission.
    pub tracking_key: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionCutoff {
    /// Reservation record: created in `processing` before any commission row
    /// is touched.
    pub fn reserve(company_id: Uuid, total_amount_cents: i64, commission_count: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            total_amount_cents,
            commission_count,
            status: CutoffStatus::Processing,
            cutoff_date: now.date_naive(),
            tracking_key: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Single-use credential-recovery token. Only the SHA-256 hash is stored.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResetToken {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub requested_ip: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Operator {
    pub id: Uuid,
    pub name: String,
    pub api_key_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate of untagged commissions for one company, as read by the cutoff
/// batch and the status query.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PendingCommissionGroup {
    pub company_id: Uuid,
    pub total_amount_cents: i64,
    pub commission_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_starts_in_grace_period() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            "Juan Perez".to_string(),
            "032180000118359719".to_string(),
            150_000,
        );

        assert_eq!(tx.status, TransferStatus::PendingConfirmation);
        let deadline = tx.confirmation_deadline.expect("deadline must be set");
        let window = deadline - tx.created_at;
        assert_eq!(window.num_seconds(), GRACE_PERIOD_SECS);
        assert!(tx.order_ref.is_none());
    }

    #[test]
    fn accrued_commission_is_untagged() {
        let commission = Commission::accrue(Uuid::new_v4(), Uuid::new_v4(), 580);
        assert!(commission.cutoff_id.is_none());
        assert_eq!(commission.amount_cents, 580);
    }

    #[test]
    fn reserved_cutoff_is_processing() {
        let cutoff = CommissionCutoff::reserve(Uuid::new_v4(), 1740, 3);
        assert_eq!(cutoff.status, CutoffStatus::Processing);
        assert!(cutoff.tracking_key.is_none());
        assert!(cutoff.error_detail.is_none());
    }
}
