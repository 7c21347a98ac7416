use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{CommissionCutoff, PendingCommissionGroup};
use crate::db::queries;
use crate::error::AppError;
use crate::spei::{CutoffSubmission, PaymentNetwork};

/// Outcome of one company's cutoff within a batch run.
#[derive(Debug, Serialize)]
pub struct CompanyCutoffOutcome {
    pub company_id: Uuid,
    pub cutoff_id: Uuid,
    pub total_amount_cents: i64,
    pub commission_count: i32,
    pub tracking_key: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct CutoffBatchReport {
    pub companies: Vec<CompanyCutoffOutcome>,
    pub total_amount_cents: i64,
    pub total_commissions: i64,
    pub failures: usize,
}

#[derive(Debug, Serialize)]
pub struct CutoffStatusReport {
    pub pending: Vec<PendingCommissionGroup>,
    pub unfinished_cutoffs: Vec<CommissionCutoff>,
}

pub struct CutoffService {
    pool: PgPool,
    spei: Arc<dyn PaymentNetwork>,
}

impl CutoffService {
    pub fn new(pool: PgPool, spei: Arc<dyn PaymentNetwork>) -> Self {
        Self { pool, spei }
    }

    /// Runs the daily cutoff across all companies with untagged commissions.
    ///
    /// Per-company isolated: one failure never aborts or rolls back another
    /// company's cutoff. A re-run over an unchanged commission set finds
    /// nothing to tag and creates no new cutoffs.
    pub async fn run(&self, actor: &str) -> Result<CutoffBatchReport, AppError> {
        let companies = queries::companies_with_pending_commissions(&self.pool).await?;
        tracing::info!(actor, "cutoff batch started for {} companies", companies.len());

        let mut report = CutoffBatchReport::default();
        for company_id in companies {
            match self.cut_company(company_id).await {
                Ok(Some(outcome)) => {
                    report.total_amount_cents += outcome.total_amount_cents;
                    report.total_commissions += i64::from(outcome.commission_count);
                    if outcome.error.is_some() {
                        report.failures += 1;
                    }
                    report.companies.push(outcome);
                }
                Ok(None) => {
                    tracing::info!(company = %company_id, "no pending commissions at snapshot time");
                }
                Err(e) => {
                    tracing::error!(company = %company_id, "cutoff failed before reservation: {}", e);
                    report.failures += 1;
                }
            }
        }

        tracing::info!(
            actor,
            companies = report.companies.len(),
            failures = report.failures,
            total_cents = report.total_amount_cents,
            "cutoff batch finished"
        );

        Ok(report)
    }

    /// Two-phase cutoff for one company: reserve the cutoff record, tag the
    /// snapshot of commissions, commit, and only then talk to the network.
    async fn cut_company(&self, company_id: Uuid) -> Result<Option<CompanyCutoffOutcome>, AppError> {
        let mut db_tx = self.pool.begin().await?;

        let pending = queries::lock_pending_commissions(&mut db_tx, company_id).await?;
        if pending.is_empty() {
            db_tx.rollback().await?;
            return Ok(None);
        }

        let total_amount_cents: i64 = pending.iter().map(|c| c.amount_cents).sum();
        let commission_count = pending.len() as i32;

        // Reservation first: a crash from here on leaves a processing cutoff
        // and untagged commissions, which a later run can reconcile, never
        // tagged commissions without a cutoff record.
        let cutoff = queries::insert_cutoff(
            &mut db_tx,
            &CommissionCutoff::reserve(company_id, total_amount_cents, commission_count),
        )
        .await?;

        let ids: Vec<Uuid> = pending.iter().map(|c| c.id).collect();
        let tagged = queries::tag_commissions(&mut db_tx, &ids, cutoff.id).await?;
        if tagged != ids.len() as u64 {
            db_tx.rollback().await?;
            return Err(AppError::Internal(format!(
                "cutoff {} tagged {} of {} commissions",
                cutoff.id,
                tagged,
                ids.len()
            )));
        }

        db_tx.commit().await?;

        // Network submission happens outside any database transaction. A
        // failure leaves the cutoff `failed` with its commissions tagged;
        // retrying is an operator decision, not an automatic re-submission.
        let outcome = match self
            .spei
            .submit_cutoff(&CutoffSubmission {
                cutoff_id: cutoff.id,
                company_id,
                total_amount_cents,
                commission_count,
                cutoff_date: cutoff.cutoff_date,
            })
            .await
        {
            Ok(accepted) => {
                queries::complete_cutoff(&self.pool, cutoff.id, &accepted.tracking_key).await?;
                tracing::info!(
                    cutoff = %cutoff.id,
                    company = %company_id,
                    tracking_key = %accepted.tracking_key,
                    "cutoff completed"
                );
                CompanyCutoffOutcome {
                    company_id,
                    cutoff_id: cutoff.id,
                    total_amount_cents,
                    commission_count,
                    tracking_key: Some(accepted.tracking_key),
                    error: None,
                }
            }
            Err(e) => {
                let detail = e.to_string();
                queries::fail_cutoff(&self.pool, cutoff.id, &detail).await?;
                tracing::error!(cutoff = %cutoff.id, company = %company_id, "cutoff submission failed: {}", detail);
                CompanyCutoffOutcome {
                    company_id,
                    cutoff_id: cutoff.id,
                    total_amount_cents,
                    commission_count,
                    tracking_key: None,
                    error: Some(detail),
                }
            }
        };

        Ok(Some(outcome))
    }

    /// Operator view: what would the next run pick up, and which cutoffs are
    /// in flight or stuck.
    pub async fn status(&self) -> Result<CutoffStatusReport, AppError> {
        let pending = queries::pending_commission_groups(&self.pool).await?;
        let unfinished_cutoffs = queries::list_unfinished_cutoffs(&self.pool).await?;

        Ok(CutoffStatusReport {
            pending,
            unfinished_cutoffs,
        })
    }
}
