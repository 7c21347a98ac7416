//! Background tasks: the periodic dispatch sweep and the daily cutoff.

use anyhow::{Context, Result};
use chrono::Local;
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{CutoffService, TransferService};
use crate::AppState;

/// Daily commission cutoff, 22:00 local time.
pub const CUTOFF_SCHEDULE: &str = "0 0 22 * * *";
/// How often expired grace periods are swept to `sent`.
pub const DISPATCH_INTERVAL_SECS: u64 = 5;

pub fn spawn(state: AppState) -> Result<()> {
    let schedule =
        Schedule::from_str(CUTOFF_SCHEDULE).context("invalid cutoff cron expression")?;

    tokio::spawn(dispatcher_loop(state.clone()));
    tokio::spawn(cutoff_loop(state, schedule));

    Ok(())
}

async fn dispatcher_loop(state: AppState) {
    let service = TransferService::new(state.db.clone(), state.spei.clone());
    let mut interval = tokio::time::interval(Duration::from_secs(DISPATCH_INTERVAL_SECS));

    loop {
        interval.tick().await;
        if let Err(e) = service.dispatch_due().await {
            tracing::error!("dispatch sweep failed: {}", e);
        }
    }
}

async fn cutoff_loop(state: AppState, schedule: Schedule) {
    let service = CutoffService::new(state.db.clone(), state.spei.clone());

    loop {
        let Some(next) = schedule.upcoming(Local).next() else {
            tracing::error!("cutoff schedule produced no upcoming run; stopping");
            return;
        };

        let wait = (next - Local::now())
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        tracing::info!("next cutoff run at {}", next);
        tokio::time::sleep(wait).await;

        match service.run("scheduler").await {
            Ok(report) => {
                tracing::info!(
                    companies = report.companies.len(),
                    failures = report.failures,
                    "scheduled cutoff finished"
                );
            }
            Err(e) => tracing::error!("scheduled cutoff failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_schedule_parses_and_fires_at_2200() {
        let schedule = Schedule::from_str(CUTOFF_SCHEDULE).unwrap();
        let next = schedule.upcoming(chrono::Utc).next().unwrap();
        use chrono::Timelike;
        assert_eq!(next.hour(), 22);
        assert_eq!(next.minute(), 0);
        assert_eq!(next.second(), 0);
    }
}
