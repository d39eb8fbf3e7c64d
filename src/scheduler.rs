// src/scheduler.rs
//
// The daily analytics cycle. It is stateless and takes the target date
// explicitly, so the cron route, the in-process loop and tests all run the
// same code.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{dates::BusinessClock, error::AppError},
    config::AppState,
    models::finance::PeriodRunSummary,
    services::ledger::LedgerDrift,
};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantCycleReport {
    pub tenant_id: Uuid,
    pub rollup_rows: usize,
    pub periods: Vec<PeriodRunSummary>,
    pub ledger_drifts: Vec<LedgerDrift>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub tenants: Vec<TenantCycleReport>,
}

/// Rollup, period closing and ledger reconciliation for every tenant, for `date`.
///
/// Tenants are processed one after the other; the first error aborts the cycle
/// and is returned. Re-running a date is always safe.
pub async fn run_daily_cycle(state: &AppState, date: NaiveDate) -> Result<CycleReport, AppError> {
    let tenant_ids = state.source.tenant_ids().await?;
    tracing::info!(%date, tenants = tenant_ids.len(), "⏱️ Starting daily analytics cycle");

    let mut tenants = Vec::with_capacity(tenant_ids.len());

    for tenant_id in tenant_ids {
        let rollup = state
            .rollup_service
            .refresh_daily_analytics(Some(tenant_id), date)
            .await?;
        let periods = state.finance_service.close_periods(tenant_id, date).await?;
        let ledger_drifts = state.finance_service.reconcile_ledger(tenant_id, date).await?;

        tenants.push(TenantCycleReport {
            tenant_id,
            rollup_rows: rollup.count,
            periods,
            ledger_drifts,
        });
    }

    tracing::info!(%date, "✅ Daily analytics cycle finished");

    Ok(CycleReport { date, tenants })
}

/// Next instant at which the local wall clock shows `run_at`, strictly after `now`.
pub fn calculate_next_run(now: DateTime<Utc>, run_at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let clock = BusinessClock::new(offset);
    let local_now = now.with_timezone(&offset).naive_local();

    let mut candidate = local_now.date().and_time(run_at);
    if candidate <= local_now {
        candidate += Duration::days(1);
    }

    clock.to_utc(candidate)
}

/// Runs the cycle for "yesterday" every day at `run_at` business time.
pub fn spawn_daily_schedule(state: AppState, run_at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        let clock = state.clock();

        loop {
            let now = Utc::now();
            let next = calculate_next_run(now, run_at, clock.offset());
            tracing::info!(next_run = %next, "Daily analytics cycle scheduled");

            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

            let date = clock.today() - Duration::days(1);
            if let Err(e) = run_daily_cycle(&state, date).await {
                tracing::error!(%date, error = %e, "🔥 Daily analytics cycle failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn next_run_is_later_today_when_time_has_not_passed() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 1, 0, 0).unwrap();
        let next = calculate_next_run(now, at(2, 30), BusinessClock::utc().offset());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 15, 2, 30, 0).unwrap());
    }

    #[test]
    fn next_run_rolls_to_tomorrow_once_passed() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 2, 30, 0).unwrap();
        let next = calculate_next_run(now, at(2, 30), BusinessClock::utc().offset());
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 16, 2, 30, 0).unwrap());
    }

    #[test]
    fn next_run_uses_business_offset() {
        // 20:00 UTC is 01:30 the next day at +05:30.
        let offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 20, 0, 0).unwrap();
        let next = calculate_next_run(now, at(2, 0), offset);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 15, 20, 30, 0).unwrap());
    }
}
