// src/services/query_service.rs

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{
        dates::{first_of_month, monday_of_week, BusinessClock, DateRange},
        error::AppError,
    },
    db::{DailyKpiStore, RawEventSource},
    models::{
        actor::ActorContext,
        analytics::{
            AnalyticsOverview, BreakdownEntry, DailyKpi, Granularity, GroupBy, KpiCard, KpiSet, Metric,
            MetricValues, QueryFilters, TablePage, TableRow, TrendDirection, TrendPoint,
        },
    },
    services::{rollup_service::RollupService, scope::ResolvedScope},
};

pub const DEFAULT_BREAKDOWN_LIMIT: i64 = 10;
pub const MAX_BREAKDOWN_LIMIT: i64 = 100;
pub const DEFAULT_TABLE_LIMIT: i64 = 50;
pub const MAX_TABLE_LIMIT: i64 = 500;

/// Everything a query service needs besides the actor.
#[derive(Clone)]
pub struct QueryDeps {
    pub kpi_store: Arc<dyn DailyKpiStore>,
    pub source: Arc<dyn RawEventSource>,
    pub rollup: RollupService,
    pub clock: BusinessClock,
    pub currency: String,
    /// Uncovered days computed on the fly per query; 0 turns the fallback off.
    pub fallback_max_days: i64,
}

#[derive(Debug, Default)]
struct Labels {
    styles: HashMap<Uuid, String>,
    vendors: HashMap<Uuid, String>,
    tailors: HashMap<Uuid, String>,
}

impl Labels {
    fn style(&self, id: Uuid) -> String {
        self.styles.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn vendor(&self, id: Uuid) -> String {
        self.vendors.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn tailor(&self, id: Uuid) -> String {
        self.tailors.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }
}

/// Read-only, role-scoped view over `daily_kpi`.
///
/// Built per request. `init()` must complete before any query; until then every
/// query fails with `ScopeNotInitialized`.
pub struct AnalyticsQueryService {
    actor: ActorContext,
    deps: QueryDeps,
    scope: Option<ResolvedScope>,
    labels: Labels,
}

impl AnalyticsQueryService {
    pub fn new(actor: ActorContext, deps: QueryDeps) -> Self {
        Self {
            actor,
            deps,
            scope: None,
            labels: Labels::default(),
        }
    }

    /// Resolves the actor's scope (a vendor's owned styles) and the dimension labels.
    pub async fn init(&mut self) -> Result<(), AppError> {
        let Some(tenant_id) = self.actor.tenant_id else {
            self.scope = Some(ResolvedScope::NoTenant);
            return Ok(());
        };

        let (styles, vendors, tailors) = tokio::try_join!(
            self.deps.source.styles(tenant_id),
            self.deps.source.vendors(tenant_id),
            self.deps.source.tailors(tenant_id),
        )?;

        let scope = ResolvedScope::resolve(&self.actor, &styles)?;

        self.labels = Labels {
            styles: styles.into_iter().map(|s| (s.id, s.name)).collect(),
            vendors: vendors.into_iter().map(|v| (v.id, v.name)).collect(),
            tailors: tailors.into_iter().map(|t| (t.id, t.name)).collect(),
        };
        self.scope = Some(scope);

        Ok(())
    }

    fn scope(&self) -> Result<&ResolvedScope, AppError> {
        self.scope.as_ref().ok_or(AppError::ScopeNotInitialized)
    }

    pub fn today(&self) -> NaiveDate {
        self.deps.clock.today()
    }

    /// Stored rows for the range, plus on-the-fly rows for days no rollup has covered.
    async fn load_rows(&self, tenant_id: Uuid, range: DateRange) -> Result<Vec<DailyKpi>, AppError> {
        if range.is_inverted() {
            return Ok(Vec::new());
        }

        let (mut rows, covered) = tokio::try_join!(
            self.deps.kpi_store.find_range(tenant_id, range),
            self.deps.kpi_store.covered_dates(tenant_id, range),
        )?;

        let today = self.today();
        let mut missing: Vec<NaiveDate> = range
            .days()
            .filter(|d| *d <= today && !covered.contains(d))
            .collect();

        // Most recent days first when the cap bites.
        let cap = usize::try_from(self.deps.fallback_max_days.max(0)).unwrap_or(usize::MAX);
        if missing.len() > cap {
            missing.drain(..missing.len() - cap);
        }

        if !missing.is_empty() {
            tracing::debug!(%tenant_id, days = missing.len(), "Computing uncovered days on the fly");
        }

        for date in missing {
            rows.extend(self.deps.rollup.compute_day_rows(tenant_id, date).await?);
        }

        Ok(rows)
    }

    // =========================================================================
    //  KPIs
    // =========================================================================

    pub async fn get_dashboard_kpis(
        &self,
        range: DateRange,
        filters: &QueryFilters,
    ) -> Result<KpiSet, AppError> {
        let scope = self.scope()?;
        scope.check_filters(filters)?;

        let totals = match scope.tenant_id() {
            Some(tenant_id) if !range.is_inverted() => {
                let rows = self.load_rows(tenant_id, range).await?;
                scope
                    .project(&rows, filters)
                    .iter()
                    .fold(MetricValues::default(), |mut acc, r| {
                        acc.add(&r.values);
                        acc
                    })
            }
            _ => MetricValues::default(),
        };

        let kpis = KpiSet::from_values(range, &totals, &self.deps.currency);
        Ok(if scope.is_tailor() { kpis.tailor_view() } else { kpis })
    }

    /// One card per visible metric, compared with the preceding range of equal length.
    pub async fn get_kpi_cards(
        &self,
        range: DateRange,
        filters: &QueryFilters,
    ) -> Result<Vec<KpiCard>, AppError> {
        let scope = self.scope()?;

        let (current, previous) = tokio::try_join!(
            self.get_dashboard_kpis(range, filters),
            self.get_dashboard_kpis(range.preceding(), filters),
        )?;

        Ok(Metric::ALL
            .into_iter()
            .filter(|m| scope.check_metric(*m).is_ok())
            .map(|metric| {
                let value = current.value(metric);
                let trend = trend_percent(value, previous.value(metric));
                KpiCard {
                    id: metric.as_str().to_string(),
                    label: metric.label().to_string(),
                    value,
                    trend,
                    trend_direction: trend_direction(trend),
                }
            })
            .collect())
    }

    // =========================================================================
    //  TREND
    // =========================================================================

    /// One point per bucket in the range, zeros included.
    pub async fn get_trend_data(
        &self,
        metric: Metric,
        range: DateRange,
        granularity: Granularity,
        filters: &QueryFilters,
    ) -> Result<Vec<TrendPoint>, AppError> {
        let scope = self.scope()?;
        scope.check_metric(metric)?;
        scope.check_filters(filters)?;

        let mut buckets: BTreeMap<NaiveDate, Decimal> = range
            .days()
            .map(|d| (bucket_start(d, granularity, range.start), Decimal::ZERO))
            .collect();

        if let Some(tenant_id) = scope.tenant_id() {
            let rows = self.load_rows(tenant_id, range).await?;
            for row in scope.project(&rows, filters) {
                if let Some(total) = buckets.get_mut(&bucket_start(row.date, granularity, range.start)) {
                    *total += row.values.get(metric);
                }
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(date, value)| TrendPoint { date, value })
            .collect())
    }

    // =========================================================================
    //  BREAKDOWN
    // =========================================================================

    /// Top `limit` groups by value. Percentages are shares of the returned
    /// entries' total, so they add up to 100 over what the caller sees.
    pub async fn get_breakdown(
        &self,
        metric: Metric,
        group_by: GroupBy,
        range: DateRange,
        limit: Option<i64>,
        filters: &QueryFilters,
    ) -> Result<Vec<BreakdownEntry>, AppError> {
        let scope = self.scope()?;
        scope.check_metric(metric)?;
        scope.check_group_by(group_by)?;
        scope.check_filters(filters)?;

        if group_by == GroupBy::Tailor && !metric.is_tailor_metric() {
            return Err(AppError::InvalidInput(format!(
                "Metric '{}' cannot be grouped by tailor.",
                metric
            )));
        }

        let limit = clamp_limit(limit, DEFAULT_BREAKDOWN_LIMIT, MAX_BREAKDOWN_LIMIT);

        let Some(tenant_id) = scope.tenant_id() else {
            return Ok(Vec::new());
        };
        let rows = self.load_rows(tenant_id, range).await?;

        let mut groups: HashMap<Uuid, Decimal> = HashMap::new();
        let mut unassigned = Decimal::ZERO;

        let visible = rows
            .iter()
            .filter(|r| scope.row_visible(r) && filters.matches(r.style_id, r.vendor_id));
        for row in visible {
            match group_by {
                GroupBy::Style => {
                    *groups.entry(row.style_id).or_default() += scope.values_of(row).get(metric);
                }
                GroupBy::Vendor => {
                    let value = scope.values_of(row).get(metric);
                    match row.vendor_id {
                        Some(vendor_id) => *groups.entry(vendor_id).or_default() += value,
                        None => unassigned += value,
                    }
                }
                GroupBy::Tailor => {
                    for (tailor_id, values) in scope.tailor_slices(row) {
                        *groups.entry(tailor_id).or_default() += values.get(metric);
                    }
                }
            }
        }

        let mut entries: Vec<BreakdownEntry> = groups
            .into_iter()
            .map(|(id, value)| BreakdownEntry {
                key: id.to_string(),
                label: match group_by {
                    GroupBy::Style => self.labels.style(id),
                    GroupBy::Vendor => self.labels.vendor(id),
                    GroupBy::Tailor => self.labels.tailor(id),
                },
                value,
                percentage: Decimal::ZERO,
            })
            .collect();
        if !unassigned.is_zero() {
            entries.push(BreakdownEntry {
                key: "unassigned".to_string(),
                label: "Unassigned".to_string(),
                value: unassigned,
                percentage: Decimal::ZERO,
            });
        }

        entries.retain(|e| !e.value.is_zero());
        entries.sort_by(|a, b| match b.value.cmp(&a.value) {
            Ordering::Equal => a.label.cmp(&b.label),
            other => other,
        });
        entries.truncate(limit);

        let total: Decimal = entries.iter().map(|e| e.value).sum();
        if !total.is_zero() {
            for entry in &mut entries {
                entry.percentage = (entry.value / total * Decimal::ONE_HUNDRED).round_dp(2);
            }
        }

        Ok(entries)
    }

    // =========================================================================
    //  TABLE
    // =========================================================================

    /// Per-day, per-style rows with labels, ordered by date then style name.
    pub async fn get_table(
        &self,
        range: DateRange,
        filters: &QueryFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<TablePage, AppError> {
        let scope = self.scope()?;
        scope.check_filters(filters)?;

        let limit = clamp_limit(limit, DEFAULT_TABLE_LIMIT, MAX_TABLE_LIMIT);
        let offset = usize::try_from(offset.unwrap_or(0).max(0)).unwrap_or(0);

        let rows = match scope.tenant_id() {
            Some(tenant_id) => self.load_rows(tenant_id, range).await?,
            None => Vec::new(),
        };

        let mut table: Vec<TableRow> = scope
            .project(&rows, filters)
            .into_iter()
            .map(|r| TableRow {
                date: r.date,
                style_id: r.style_id,
                style_name: self.labels.style(r.style_id),
                vendor_id: r.vendor_id,
                vendor_name: r.vendor_id.map(|v| self.labels.vendor(v)),
                cutting_received_pcs: r.values.cutting_received_pcs,
                in_production_pcs: r.values.in_production_pcs,
                in_production_orders: r.values.in_production_orders,
                completed_pcs: r.values.completed_pcs,
                shipped_pcs: r.values.shipped_pcs,
                pending_from_tailors_pcs: r.values.pending_from_tailors_pcs,
                expected_receivable_amount: r.values.expected_receivable,
                tailoring_expense_amount: r.values.tailoring_expense,
            })
            .collect();

        table.sort_by(|a, b| {
            (a.date, &a.style_name, a.style_id).cmp(&(b.date, &b.style_name, b.style_id))
        });

        let total = table.len();
        let rows = table.into_iter().skip(offset).take(limit).collect();

        Ok(TablePage { rows, total, limit, offset })
    }

    // =========================================================================
    //  OVERVIEW
    // =========================================================================

    /// KPIs, trend and breakdown in one round trip. Without an explicit metric,
    /// tailors get completed pieces and everyone else shipped pieces.
    pub async fn get_overview(
        &self,
        range: DateRange,
        metric: Option<Metric>,
        group_by: Option<GroupBy>,
        granularity: Granularity,
        filters: &QueryFilters,
    ) -> Result<AnalyticsOverview, AppError> {
        let scope = self.scope()?;
        let metric = metric.unwrap_or(if scope.is_tailor() {
            Metric::PcsCompleted
        } else {
            Metric::PcsShipped
        });
        let group_by = group_by.unwrap_or(GroupBy::Style);

        let (kpis, trend, breakdown) = tokio::try_join!(
            self.get_dashboard_kpis(range, filters),
            self.get_trend_data(metric, range, granularity, filters),
            self.get_breakdown(metric, group_by, range, None, filters),
        )?;

        Ok(AnalyticsOverview { kpis, trend, breakdown })
    }
}

/// Percent change; 100 when growing from nothing, 0 when both are zero.
pub fn trend_percent(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
    }
    ((current - previous) / previous.abs() * Decimal::ONE_HUNDRED).round_dp(2)
}

pub fn trend_direction(trend: Decimal) -> TrendDirection {
    if trend.abs() < Decimal::new(1, 2) {
        TrendDirection::Flat
    } else if trend > Decimal::ZERO {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    }
}

/// Start of the bucket containing `date`, never before the range start.
pub fn bucket_start(date: NaiveDate, granularity: Granularity, range_start: NaiveDate) -> NaiveDate {
    let start = match granularity {
        Granularity::Day => date,
        Granularity::Week => monday_of_week(date),
        Granularity::Month => first_of_month(date),
    };
    start.max(range_start)
}

fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> usize {
    let limit = match limit {
        Some(l) if l > 0 => l.min(max),
        _ => default,
    };
    usize::try_from(limit).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn trend_handles_zero_baseline() {
        assert_eq!(trend_percent(Decimal::from(5), Decimal::ZERO), Decimal::ONE_HUNDRED);
        assert_eq!(trend_percent(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(trend_percent(Decimal::from(150), Decimal::from(100)), Decimal::from(50));
        assert_eq!(trend_direction(Decimal::new(-25, 0)), TrendDirection::Down);
        assert_eq!(trend_direction(Decimal::new(5, 3)), TrendDirection::Flat);
    }

    #[test]
    fn buckets_are_clipped_to_range_start() {
        let start = d(2024, 3, 13);
        assert_eq!(bucket_start(d(2024, 3, 14), Granularity::Week, start), start);
        assert_eq!(bucket_start(d(2024, 3, 20), Granularity::Week, start), d(2024, 3, 18));
        assert_eq!(bucket_start(d(2024, 4, 2), Granularity::Month, start), d(2024, 4, 1));
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, 10, 100), 10);
        assert_eq!(clamp_limit(Some(0), 10, 100), 10);
        assert_eq!(clamp_limit(Some(-3), 10, 100), 10);
        assert_eq!(clamp_limit(Some(1000), 10, 100), 100);
        assert_eq!(clamp_limit(Some(7), 10, 100), 7);
    }
}
