//! Write-only audit sink. Rows are inserted inside the same database
//! transaction as the mutation they describe and are never read back here.

use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

pub const ENTITY_TRANSFER: &str = "transfer";
pub const ENTITY_CUTOFF: &str = "commission_cutoff";
pub const ENTITY_RESET_TOKEN: &str = "reset_token";

pub struct AuditLog;

impl AuditLog {
    pub async fn record(
        executor: &mut SqlxTransaction<'_, Postgres>,
        entity_id: Uuid,
        entity_type: &str,
        action: &str,
        detail: serde_json::Value,
        actor: &str,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, entity_id, entity_type, action, detail, actor, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entity_id)
        .bind(entity_type)
        .bind(action)
        .bind(detail)
        .bind(actor)
        .execute(&mut **executor)
        .await?;

        Ok(())
    }

    pub async fn log_creation(
        executor: &mut SqlxTransaction<'_, Postgres>,
        entity_id: Uuid,
        entity_type: &str,
        detail: serde_json::Value,
        actor: &str,
    ) -> sqlx::Result<()> {
        Self::record(executor, entity_id, entity_type, "created", detail, actor).await
    }

    pub async fn log_status_change(
        executor: &mut SqlxTransaction<'_, Postgres>,
        entity_id: Uuid,
        entity_type: &str,
        old_status: &str,
        new_status: &str,
        actor: &str,
    ) -> sqlx::Result<()> {
        Self::record(
            executor,
            entity_id,
            entity_type,
            "status_change",
            serde_json::json!({ "old": old_status, "new": new_status }),
            actor,
        )
        .await
    }
}
