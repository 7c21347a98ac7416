use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::audit::{AuditLog, ENTITY_CUTOFF, ENTITY_TRANSFER};
use crate::db::models::{
    Commission, CommissionCutoff, Operator, PendingCommissionGroup, Transaction,
};
use crate::db::models::ResetToken;
use crate::domain::TransferStatus;
use serde_json::json;

// --- Transfer queries ---

pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    let mut transaction = pool.begin().await?;

    let result = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, company_id, beneficiary_name, beneficiary_account, amount_cents,
            status, order_ref, confirmation_deadline, status_detail, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.company_id)
    .bind(&tx.beneficiary_name)
    .bind(&tx.beneficiary_account)
    .bind(tx.amount_cents)
    .bind(tx.status)
    .bind(&tx.order_ref)
    .bind(tx.confirmation_deadline)
    .bind(&tx.status_detail)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(&mut *transaction)
    .await?;

    AuditLog::log_creation(
        &mut transaction,
        result.id,
        ENTITY_TRANSFER,
        json!({
            "company_id": result.company_id,
            "beneficiary_name": result.beneficiary_name,
            "amount_cents": result.amount_cents,
            "status": result.status.as_str(),
        }),
        "system",
    )
    .await?;

    transaction.commit().await?;
    Ok(result)
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_transaction_by_order_ref(
    pool: &PgPool,
    order_ref: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE order_ref = $1")
        .bind(order_ref)
        .fetch_optional(pool)
        .await
}

/// Records the payment-network order id. Guarded so a retried placement can
/// never overwrite an existing reference.
pub async fn set_order_ref(pool: &PgPool, id: Uuid, order_ref: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE transactions SET order_ref = $2, updated_at = NOW() \
         WHERE id = $1 AND order_ref IS NULL",
    )
    .bind(id)
    .bind(order_ref)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// The cancel compare-and-swap: succeeds only while the row is still in
/// `pending_confirmation` and the grace deadline has not passed. Returns the
/// canceled row, or `None` when the condition no longer holds (caller
/// re-reads to report why).
pub async fn cancel_transaction(pool: &PgPool, id: Uuid, actor: &str) -> Result<Option<Transaction>> {
    let mut transaction = pool.begin().await?;

    let canceled = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = 'canceled', confirmation_deadline = NULL, updated_at = NOW()
        WHERE id = $1
          AND status = 'pending_confirmation'
          AND confirmation_deadline > NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *transaction)
    .await?;

    if let Some(ref row) = canceled {
        AuditLog::log_status_change(
            &mut transaction,
            row.id,
            ENTITY_TRANSFER,
            TransferStatus::PendingConfirmation.as_str(),
            row.status.as_str(),
            actor,
        )
        .await?;
    }

    transaction.commit().await?;
    Ok(canceled)
}

/// Appends an operational note to `status_detail` without touching status.
/// Used to record a failed best-effort network cancel; the note also lands in
/// the audit sink.
pub async fn append_status_detail(pool: &PgPool, id: Uuid, detail: &str) -> Result<()> {
    let mut transaction = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE transactions
        SET status_detail = CASE
                WHEN status_detail IS NULL THEN $2
                ELSE status_detail || '; ' || $2
            END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(detail)
    .execute(&mut *transaction)
    .await?;

    AuditLog::record(
        &mut transaction,
        id,
        ENTITY_TRANSFER,
        "detail_appended",
        json!({ "detail": detail }),
        "system",
    )
    .await?;

    transaction.commit().await?;
    Ok(())
}

/// Sweep: transitions every expired `pending_confirmation` row with a placed
/// order to `sent`. Unexpired rows are untouched by the predicate.
pub async fn mark_due_transfers_sent(pool: &PgPool) -> Result<Vec<Transaction>> {
    let mut transaction = pool.begin().await?;

    let sent = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = 'sent', confirmation_deadline = NULL, updated_at = NOW()
        WHERE status = 'pending_confirmation'
          AND confirmation_deadline <= NOW()
          AND order_ref IS NOT NULL
        RETURNING *
        "#,
    )
    .fetch_all(&mut *transaction)
    .await?;

    for row in &sent {
        AuditLog::log_status_change(
            &mut transaction,
            row.id,
            ENTITY_TRANSFER,
            TransferStatus::PendingConfirmation.as_str(),
            row.status.as_str(),
            "dispatcher",
        )
        .await?;
    }

    transaction.commit().await?;
    Ok(sent)
}

/// Rows whose initial order placement failed and needs a retry.
pub async fn transfers_awaiting_order(pool: &PgPool) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions \
         WHERE status = 'pending_confirmation' AND order_ref IS NULL \
         ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
}

/// Webhook-driven status application. The predicate mirrors
/// [`TransferStatus::can_transition`]: from `pending_confirmation` anything
/// is reachable, from `sent` only the terminal rail outcomes. The caller
/// distinguishes duplicate deliveries from retrograde ones by re-reading the
/// current status when zero rows match.
pub async fn update_status_if_active(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    new_status: TransferStatus,
    detail: Option<&str>,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2,
            status_detail = COALESCE($3, status_detail),
            confirmation_deadline = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND status <> $2
          AND (
              status = 'pending_confirmation'
              OR (status = 'sent' AND $2 IN ('scattered', 'returned'))
          )
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(new_status)
    .bind(detail)
    .fetch_optional(&mut **executor)
    .await
}

// --- Commission queries ---

pub async fn insert_commission(
    executor: &mut SqlxTransaction<'_, Postgres>,
    commission: &Commission,
) -> Result<Commission> {
    sqlx::query_as::<_, Commission>(
        r#"
        INSERT INTO commissions (id, company_id, transaction_id, amount_cents, accrued_at, cutoff_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(commission.id)
    .bind(commission.company_id)
    .bind(commission.transaction_id)
    .bind(commission.amount_cents)
    .bind(commission.accrued_at)
    .bind(commission.cutoff_id)
    .fetch_one(&mut **executor)
    .await
}

pub async fn companies_with_pending_commissions(pool: &PgPool) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT DISTINCT company_id FROM commissions WHERE cutoff_id IS NULL")
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Snapshot of one company's untagged commissions, locked for the duration of
/// the cutoff transaction.
pub async fn lock_pending_commissions(
    executor: &mut SqlxTransaction<'_, Postgres>,
    company_id: Uuid,
) -> Result<Vec<Commission>> {
    sqlx::query_as::<_, Commission>(
        r#"
        SELECT * FROM commissions
        WHERE company_id = $1
          AND cutoff_id IS NULL
        ORDER BY accrued_at
        FOR UPDATE
        "#,
    )
    .bind(company_id)
    .fetch_all(&mut **executor)
    .await
}

/// Tags constituent commissions. The `cutoff_id IS NULL` predicate repeats the
/// snapshot filter so a commission can never be claimed by two cutoffs.
pub async fn tag_commissions(
    executor: &mut SqlxTransaction<'_, Postgres>,
    commission_ids: &[Uuid],
    cutoff_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE commissions SET cutoff_id = $1 WHERE id = ANY($2) AND cutoff_id IS NULL",
    )
    .bind(cutoff_id)
    .bind(commission_ids)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn insert_cutoff(
    executor: &mut SqlxTransaction<'_, Postgres>,
    cutoff: &CommissionCutoff,
) -> Result<CommissionCutoff> {
    let result = sqlx::query_as::<_, CommissionCutoff>(
        r#"
        INSERT INTO commission_cutoffs (
            id, company_id, total_amount_cents, commission_count, status,
            cutoff_date, tracking_key, error_detail, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(cutoff.id)
    .bind(cutoff.company_id)
    .bind(cutoff.total_amount_cents)
    .bind(cutoff.commission_count)
    .bind(cutoff.status)
    .bind(cutoff.cutoff_date)
    .bind(&cutoff.tracking_key)
    .bind(&cutoff.error_detail)
    .bind(cutoff.created_at)
    .bind(cutoff.updated_at)
    .fetch_one(&mut **executor)
    .await?;

    AuditLog::log_creation(
        executor,
        result.id,
        ENTITY_CUTOFF,
        json!({
            "company_id": result.company_id,
            "total_amount_cents": result.total_amount_cents,
            "commission_count": result.commission_count,
            "cutoff_date": result.cutoff_date.to_string(),
        }),
        "cutoff_batch",
    )
    .await?;

    Ok(result)
}

pub async fn complete_cutoff(
    pool: &PgPool,
    id: Uuid,
    tracking_key: &str,
) -> Result<Option<CommissionCutoff>> {
    sqlx::query_as::<_, CommissionCutoff>(
        r#"
        UPDATE commission_cutoffs
        SET status = 'completed', tracking_key = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(tracking_key)
    .fetch_optional(pool)
    .await
}

pub async fn fail_cutoff(
    pool: &PgPool,
    id: Uuid,
    error_detail: &str,
) -> Result<Option<CommissionCutoff>> {
    sqlx::query_as::<_, CommissionCutoff>(
        r#"
        UPDATE commission_cutoffs
        SET status = 'failed', error_detail = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'processing'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(error_detail)
    .fetch_optional(pool)
    .await
}

pub async fn get_cutoff(pool: &PgPool, id: Uuid) -> Result<Option<CommissionCutoff>> {
    sqlx::query_as::<_, CommissionCutoff>("SELECT * FROM commission_cutoffs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn pending_commission_groups(pool: &PgPool) -> Result<Vec<PendingCommissionGroup>> {
    sqlx::query_as::<_, PendingCommissionGroup>(
        r#"
        SELECT company_id,
               COALESCE(SUM(amount_cents), 0)::BIGINT AS total_amount_cents,
               COUNT(*) AS commission_count
        FROM commissions
        WHERE cutoff_id IS NULL
        GROUP BY company_id
        ORDER BY company_id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Cutoffs still in flight or requiring operator intervention.
pub async fn list_unfinished_cutoffs(pool: &PgPool) -> Result<Vec<CommissionCutoff>> {
    sqlx::query_as::<_, CommissionCutoff>(
        "SELECT * FROM commission_cutoffs \
         WHERE status IN ('processing', 'failed') \
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await
}

// --- Reset token / credential queries ---

pub async fn insert_reset_token(pool: &PgPool, token: &ResetToken) -> Result<()> {
    let mut transaction = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO reset_tokens (id, email, token_hash, requested_ip, expires_at, consumed_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(token.id)
    .bind(&token.email)
    .bind(&token.token_hash)
    .bind(&token.requested_ip)
    .bind(token.expires_at)
    .bind(token.consumed_at)
    .bind(token.created_at)
    .execute(&mut *transaction)
    .await?;

    // The raw token never reaches the audit sink.
    AuditLog::log_creation(
        &mut transaction,
        token.id,
        crate::db::audit::ENTITY_RESET_TOKEN,
        json!({
            "email": token.email,
            "requested_ip": token.requested_ip,
            "expires_at": token.expires_at.to_rfc3339(),
        }),
        "system",
    )
    .await?;

    transaction.commit().await?;
    Ok(())
}

/// Existence, non-expiry and single-use checked and consumed in one
/// statement. Concurrent redemptions: at most one caller gets the email back.
pub async fn consume_reset_token(pool: &PgPool, token_hash: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        UPDATE reset_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING email
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(email,)| email))
}

pub async fn user_exists(pool: &PgPool, email: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1::BIGINT FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn update_user_password(pool: &PgPool, email: &str, password_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE email = $1",
    )
    .bind(email)
    .bind(password_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_operator_by_key_hash(pool: &PgPool, api_key_hash: &str) -> Result<Option<Operator>> {
    sqlx::query_as::<_, Operator>("SELECT * FROM operators WHERE api_key_hash = $1")
        .bind(api_key_hash)
        .fetch_optional(pool)
        .await
}
