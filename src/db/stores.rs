// src/db/stores.rs
//
// Seams between the engines and storage. Postgres repositories implement
// these for production; `InMemoryStore` implements them for tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::{
        dates::{DateRange, TimeWindow},
        error::AppError,
    },
    models::{
        analytics::DailyKpi,
        finance::{FinancialPeriod, PeriodType, PeriodWriteStatus},
        raw_events::{
            DimensionRef, RawCuttingEvent, RawProductionJob, RawShipment, RawTailorPaymentEntry,
            StyleRef,
        },
    },
};

/// Read-only access to the operational records.
#[async_trait]
pub trait RawEventSource: Send + Sync + 'static {
    /// Tenants that own at least one style.
    async fn tenant_ids(&self) -> Result<Vec<Uuid>, AppError>;

    async fn styles(&self, tenant_id: Uuid) -> Result<Vec<StyleRef>, AppError>;

    async fn vendors(&self, tenant_id: Uuid) -> Result<Vec<DimensionRef>, AppError>;

    async fn tailors(&self, tenant_id: Uuid) -> Result<Vec<DimensionRef>, AppError>;

    async fn cutting_events(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawCuttingEvent>, AppError>;

    /// Jobs issued or completed inside the window.
    async fn production_jobs(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawProductionJob>, AppError>;

    async fn shipments(&self, tenant_id: Uuid, window: TimeWindow) -> Result<Vec<RawShipment>, AppError>;

    /// Ledger entries ordered by tailor, then time.
    async fn tailor_payments(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawTailorPaymentEntry>, AppError>;

    /// Pieces cut minus pieces shipped strictly before `at`.
    async fn stock_pieces_at(&self, tenant_id: Uuid, at: DateTime<Utc>) -> Result<i64, AppError>;
}

/// The `daily_kpi` collection. Written only by the rollup engine.
#[async_trait]
pub trait DailyKpiStore: Send + Sync + 'static {
    /// Atomically makes `rows` the complete set of rows for `(tenant_id, date)`
    /// and records the date as refreshed. Returns the number of rows.
    async fn replace_day(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
        rows: &[DailyKpi],
    ) -> Result<usize, AppError>;

    async fn find_range(&self, tenant_id: Uuid, range: DateRange) -> Result<Vec<DailyKpi>, AppError>;

    /// Dates of `range` that have been refreshed at least once.
    async fn covered_dates(
        &self,
        tenant_id: Uuid,
        range: DateRange,
    ) -> Result<BTreeSet<NaiveDate>, AppError>;
}

/// The `financial_periods` collection. Written only by the period engine.
#[async_trait]
pub trait FinancialPeriodStore: Send + Sync + 'static {
    /// Inserts or fully replaces the period, always leaving `is_finalized` false.
    /// A finalized period is left untouched and reported as skipped.
    async fn upsert_period(&self, period: &FinancialPeriod) -> Result<PeriodWriteStatus, AppError>;

    async fn find_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<Option<FinancialPeriod>, AppError>;

    /// Marks a period closed. Returns false when no such period exists.
    async fn finalize_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<bool, AppError>;
}
