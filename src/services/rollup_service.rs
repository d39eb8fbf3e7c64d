// src/services/rollup_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::{dates::BusinessClock, error::AppError, status_sets::StatusSets},
    db::{DailyKpiStore, RawEventSource},
    models::analytics::{DailyKpi, RefreshOutcome},
    services::aggregations::{
        CuttingReceived, ProductionProgress, RollupAccumulator, ShipmentsOut, StyleAggregation,
    },
};

/// Daily rollup engine: compacts one business day of raw events into
/// `daily_kpi` rows, one per style with activity.
#[derive(Clone)]
pub struct RollupService {
    source: Arc<dyn RawEventSource>,
    store: Arc<dyn DailyKpiStore>,
    statuses: Arc<StatusSets>,
    clock: BusinessClock,
}

impl RollupService {
    pub fn new(
        source: Arc<dyn RawEventSource>,
        store: Arc<dyn DailyKpiStore>,
        statuses: Arc<StatusSets>,
        clock: BusinessClock,
    ) -> Self {
        Self { source, store, statuses, clock }
    }

    /// Recomputes `date` for the tenant and replaces its rows.
    ///
    /// Safe to re-run and to run concurrently for the same date: every run
    /// writes the complete set for the day. Errors propagate, nothing is retried.
    pub async fn refresh_daily_analytics(
        &self,
        tenant_id: Option<Uuid>,
        date: NaiveDate,
    ) -> Result<RefreshOutcome, AppError> {
        let Some(tenant_id) = tenant_id else {
            tracing::debug!(%date, "Rollup called without a tenant, nothing to do");
            return Ok(RefreshOutcome { success: true, count: 0 });
        };

        let rows = self.compute_day_rows(tenant_id, date).await?;
        let count = self.store.replace_day(tenant_id, date, &rows).await?;

        tracing::info!(%tenant_id, %date, rows = count, "Daily analytics refreshed");

        Ok(RefreshOutcome { success: true, count })
    }

    /// Aggregates `date` without writing anything.
    pub async fn compute_day_rows(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<DailyKpi>, AppError> {
        // 1. Business-day boundaries
        let window = self.clock.day_window(date);

        // 2. Independent reads, concurrently
        let (styles, cuttings, jobs, shipments) = tokio::try_join!(
            self.source.styles(tenant_id),
            self.source.cutting_events(tenant_id, window),
            self.source.production_jobs(tenant_id, window),
            self.source.shipments(tenant_id, window),
        )?;

        let catalogue: HashMap<Uuid, _> = styles.into_iter().map(|s| (s.id, s)).collect();

        // 3. Fold every source into per-style partials
        let mut acc = RollupAccumulator::new();
        CuttingReceived.fold_all(&window, &cuttings, &mut acc);
        ProductionProgress { statuses: &self.statuses }.fold_all(&window, &jobs, &mut acc);
        ShipmentsOut { statuses: &self.statuses, catalogue: &catalogue }.fold_all(
            &window,
            &shipments,
            &mut acc,
        );

        tracing::debug!(
            %tenant_id,
            %date,
            cuttings = cuttings.len(),
            jobs = jobs.len(),
            shipments = shipments.len(),
            styles = acc.len(),
            "Raw events folded"
        );

        // 4. Merge into complete rows
        Ok(acc.into_rows(tenant_id, date, &catalogue, Utc::now()))
    }
}
