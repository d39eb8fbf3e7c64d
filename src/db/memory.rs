// src/db/memory.rs
//
// Process-local implementation of every store trait. Used by the test suites
// and handy for running the API without a database.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::{
        dates::{DateRange, TimeWindow},
        error::AppError,
    },
    db::stores::{DailyKpiStore, FinancialPeriodStore, RawEventSource},
    models::{
        analytics::DailyKpi,
        finance::{FinancialPeriod, PeriodType, PeriodWriteStatus},
        raw_events::{
            DimensionRef, RawCuttingEvent, RawProductionJob, RawShipment, RawTailorPaymentEntry,
            StyleRef,
        },
    },
};

#[derive(Default)]
struct Tables {
    styles: Vec<StyleRef>,
    vendors: Vec<DimensionRef>,
    tailors: Vec<DimensionRef>,
    cuttings: Vec<RawCuttingEvent>,
    jobs: Vec<RawProductionJob>,
    shipments: Vec<RawShipment>,
    payments: Vec<RawTailorPaymentEntry>,

    daily_kpi: BTreeMap<(Uuid, NaiveDate, Uuid), DailyKpi>,
    rollup_runs: BTreeMap<(Uuid, NaiveDate), usize>,
    periods: BTreeMap<(Uuid, PeriodType, String), FinancialPeriod>,

    fail_reads: bool,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    //  SEEDING
    // =========================================================================

    pub async fn add_style(&self, style: StyleRef) {
        self.tables.write().await.styles.push(style);
    }

    pub async fn add_vendor(&self, vendor: DimensionRef) {
        self.tables.write().await.vendors.push(vendor);
    }

    pub async fn add_tailor(&self, tailor: DimensionRef) {
        self.tables.write().await.tailors.push(tailor);
    }

    pub async fn add_cutting(&self, event: RawCuttingEvent) {
        self.tables.write().await.cuttings.push(event);
    }

    pub async fn add_job(&self, job: RawProductionJob) {
        self.tables.write().await.jobs.push(job);
    }

    /// Replaces the job with the same id, e.g. to simulate a status change.
    pub async fn update_job(&self, job: RawProductionJob) {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.jobs.iter_mut().find(|j| j.id == job.id) {
            *existing = job;
        }
    }

    pub async fn add_shipment(&self, shipment: RawShipment) {
        self.tables.write().await.shipments.push(shipment);
    }

    pub async fn add_payment(&self, entry: RawTailorPaymentEntry) {
        self.tables.write().await.payments.push(entry);
    }

    /// Makes every raw event read fail, to exercise error propagation.
    pub async fn set_fail_reads(&self, fail: bool) {
        self.tables.write().await.fail_reads = fail;
    }

    // =========================================================================
    //  INSPECTION
    // =========================================================================

    pub async fn daily_rows(&self, tenant_id: Uuid, date: NaiveDate) -> Vec<DailyKpi> {
        self.tables
            .read()
            .await
            .daily_kpi
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.kpi_date == date)
            .cloned()
            .collect()
    }

    pub async fn daily_row_count(&self) -> usize {
        self.tables.read().await.daily_kpi.len()
    }

    pub async fn period_count(&self) -> usize {
        self.tables.read().await.periods.len()
    }
}

fn check_reads(tables: &Tables) -> Result<(), AppError> {
    if tables.fail_reads {
        return Err(AppError::InternalServerError(anyhow::anyhow!(
            "raw event source unavailable"
        )));
    }
    Ok(())
}

fn in_window(window: &TimeWindow, at: DateTime<Utc>) -> bool {
    window.contains(at)
}

#[async_trait]
impl RawEventSource for InMemoryStore {
    async fn tenant_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        let ids: BTreeSet<Uuid> = tables.styles.iter().map(|s| s.tenant_id).collect();
        Ok(ids.into_iter().collect())
    }

    async fn styles(&self, tenant_id: Uuid) -> Result<Vec<StyleRef>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        Ok(tables.styles.iter().filter(|s| s.tenant_id == tenant_id).cloned().collect())
    }

    async fn vendors(&self, tenant_id: Uuid) -> Result<Vec<DimensionRef>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        Ok(tables.vendors.iter().filter(|v| v.tenant_id == tenant_id).cloned().collect())
    }

    async fn tailors(&self, tenant_id: Uuid) -> Result<Vec<DimensionRef>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        Ok(tables.tailors.iter().filter(|t| t.tenant_id == tenant_id).cloned().collect())
    }

    async fn cutting_events(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawCuttingEvent>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        Ok(tables
            .cuttings
            .iter()
            .filter(|e| e.tenant_id == tenant_id && in_window(&window, e.occurred_at))
            .cloned()
            .collect())
    }

    async fn production_jobs(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawProductionJob>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        Ok(tables
            .jobs
            .iter()
            .filter(|j| j.tenant_id == tenant_id)
            .filter(|j| {
                in_window(&window, j.issue_date)
                    || j.completed_date.is_some_and(|c| in_window(&window, c))
            })
            .cloned()
            .collect())
    }

    async fn shipments(&self, tenant_id: Uuid, window: TimeWindow) -> Result<Vec<RawShipment>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        Ok(tables
            .shipments
            .iter()
            .filter(|s| s.tenant_id == tenant_id && in_window(&window, s.shipped_at))
            .cloned()
            .collect())
    }

    async fn tailor_payments(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawTailorPaymentEntry>, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        let mut entries: Vec<RawTailorPaymentEntry> = tables
            .payments
            .iter()
            .filter(|p| p.tenant_id == tenant_id && in_window(&window, p.occurred_at))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            (a.tailor_id, a.occurred_at, a.id).cmp(&(b.tailor_id, b.occurred_at, b.id))
        });
        Ok(entries)
    }

    async fn stock_pieces_at(&self, tenant_id: Uuid, at: DateTime<Utc>) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        check_reads(&tables)?;
        let cut: i64 = tables
            .cuttings
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.occurred_at < at)
            .map(|e| e.quantity_received)
            .sum();
        let shipped: i64 = tables
            .shipments
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.shipped_at < at)
            .map(|s| s.pcs_shipped)
            .sum();
        Ok(cut - shipped)
    }
}

#[async_trait]
impl DailyKpiStore for InMemoryStore {
    async fn replace_day(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
        rows: &[DailyKpi],
    ) -> Result<usize, AppError> {
        let mut tables = self.tables.write().await;

        let keep: BTreeSet<Uuid> = rows.iter().map(|r| r.style_id).collect();
        tables
            .daily_kpi
            .retain(|(t, d, s), _| !(*t == tenant_id && *d == date && !keep.contains(s)));

        for row in rows {
            let key = (tenant_id, date, row.style_id);
            // Unchanged rows keep their original updated_at.
            let unchanged = tables.daily_kpi.get(&key).is_some_and(|existing| existing.metrics_eq(row));
            if !unchanged {
                tables.daily_kpi.insert(key, row.clone());
            }
        }

        tables.rollup_runs.insert((tenant_id, date), rows.len());
        Ok(rows.len())
    }

    async fn find_range(&self, tenant_id: Uuid, range: DateRange) -> Result<Vec<DailyKpi>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .daily_kpi
            .values()
            .filter(|r| r.tenant_id == tenant_id && range.contains(r.kpi_date))
            .cloned()
            .collect())
    }

    async fn covered_dates(
        &self,
        tenant_id: Uuid,
        range: DateRange,
    ) -> Result<BTreeSet<NaiveDate>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rollup_runs
            .keys()
            .filter(|(t, d)| *t == tenant_id && range.contains(*d))
            .map(|(_, d)| *d)
            .collect())
    }
}

#[async_trait]
impl FinancialPeriodStore for InMemoryStore {
    async fn upsert_period(&self, period: &FinancialPeriod) -> Result<PeriodWriteStatus, AppError> {
        let mut tables = self.tables.write().await;
        let key = (period.tenant_id, period.period_type, period.period_key.clone());

        if tables.periods.get(&key).is_some_and(|p| p.is_finalized) {
            return Ok(PeriodWriteStatus::SkippedFinalized);
        }

        let mut stored = period.clone();
        stored.is_finalized = false;
        tables.periods.insert(key, stored);
        Ok(PeriodWriteStatus::Written)
    }

    async fn find_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<Option<FinancialPeriod>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .periods
            .get(&(tenant_id, period_type, period_key.to_string()))
            .cloned())
    }

    async fn finalize_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.periods.get_mut(&(tenant_id, period_type, period_key.to_string())) {
            Some(period) => {
                period.is_finalized = true;
                period.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
