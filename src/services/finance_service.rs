// src/services/finance_service.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{
        dates::{BusinessClock, TimeWindow},
        error::AppError,
        periods::{periods_closing_on, PeriodWindow},
        status_sets::StatusSets,
    },
    db::{FinancialPeriodStore, RawEventSource},
    models::{
        finance::{
            CostBreakdown, FinancialPeriod, InventoryTurnover, PeriodRunSummary, PeriodType,
            PlStatement, RevenueBreakdown, RevenueSummary,
        },
        raw_events::{RawCuttingEvent, RawProductionJob, RawShipment, RawTailorPaymentEntry, StyleRef},
    },
    services::{
        aggregations::shipment_value,
        ledger::{self, LedgerDrift},
    },
};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Configured rates for the cost lines that do not come from raw events.
/// Daily amounts are multiplied by the number of days in the window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostRates {
    pub fabric_cost_per_meter: Decimal,
    pub daily_overhead: Decimal,
    pub daily_depreciation: Decimal,
    pub daily_interest: Decimal,
    /// Percent, e.g. `25` for 25%.
    pub tax_rate_pct: Decimal,
}

// =========================================================================
//  PURE COMPUTATIONS
// =========================================================================

/// Revenue from shipments that actually left (status in the receivable set).
pub fn revenue_summary(
    shipments: &[RawShipment],
    statuses: &StatusSets,
    catalogue: &HashMap<Uuid, StyleRef>,
) -> RevenueSummary {
    shipments
        .iter()
        .filter(|s| statuses.receivable_shipment.contains(&s.shipment_status))
        .fold(RevenueSummary::default(), |mut acc, s| {
            acc.total += shipment_value(s, unit_price(catalogue, s.style_id));
            acc.shipment_count += 1;
            acc.pcs_shipped += s.pcs_shipped;
            acc
        })
}

pub fn cost_breakdown(
    cuttings: &[RawCuttingEvent],
    payments: &[RawTailorPaymentEntry],
    rates: &CostRates,
    days: i64,
) -> CostBreakdown {
    let meters: Decimal = cuttings.iter().map(|c| c.fabric_meters).sum();
    let fabric_cost = meters * rates.fabric_cost_per_meter;
    let tailoring_cost = ledger::tailoring_cost(payments);
    let direct_costs = fabric_cost + tailoring_cost;

    let days = Decimal::from(days.max(0));
    let operating_overhead = rates.daily_overhead * days;
    let depreciation = rates.daily_depreciation * days;
    let interest = rates.daily_interest * days;

    CostBreakdown {
        fabric_cost,
        tailoring_cost,
        direct_costs,
        operating_overhead,
        depreciation,
        interest,
        total: direct_costs + operating_overhead + depreciation + interest,
    }
}

/// `value / revenue` as a percentage with two decimals; 0 when there is no revenue.
pub fn margin(value: Decimal, revenue: Decimal) -> Decimal {
    if revenue.is_zero() {
        return Decimal::ZERO;
    }
    (value / revenue * HUNDRED).round_dp(2)
}

pub fn pl_statement(revenue: Decimal, costs: &CostBreakdown, tax_rate_pct: Decimal) -> PlStatement {
    let gross_profit = revenue - costs.direct_costs;
    let ebitda = gross_profit - costs.operating_overhead;
    let operating_profit = ebitda - costs.depreciation;
    let pre_tax = operating_profit - costs.interest;
    // No tax on a loss.
    let taxes = (pre_tax.max(Decimal::ZERO) * tax_rate_pct / HUNDRED).round_dp(2);
    let net_profit = pre_tax - taxes;

    PlStatement {
        revenue,
        direct_costs: costs.direct_costs,
        gross_profit,
        gross_profit_margin: margin(gross_profit, revenue),
        operating_overhead: costs.operating_overhead,
        ebitda,
        depreciation: costs.depreciation,
        operating_profit,
        operating_margin: margin(operating_profit, revenue),
        interest: costs.interest,
        taxes,
        net_profit,
        net_profit_margin: margin(net_profit, revenue),
    }
}

/// Revenue split by vendor, style, size and fabric type (from shipments) and by
/// tailor (completed pieces valued at the style's unit price).
pub fn revenue_breakdown(
    window: &TimeWindow,
    shipments: &[RawShipment],
    jobs: &[RawProductionJob],
    statuses: &StatusSets,
    catalogue: &HashMap<Uuid, StyleRef>,
) -> RevenueBreakdown {
    let mut breakdown = RevenueBreakdown::default();

    for s in shipments
        .iter()
        .filter(|s| statuses.receivable_shipment.contains(&s.shipment_status))
    {
        let style = catalogue.get(&s.style_id);
        let value = shipment_value(s, style.and_then(|st| st.unit_price));

        add(&mut breakdown.by_vendor, s.vendor_id.to_string(), value);
        add(&mut breakdown.by_style, s.style_id.to_string(), value);
        add(
            &mut breakdown.by_size,
            s.size.clone().unwrap_or_else(|| "unspecified".to_string()),
            value,
        );
        add(
            &mut breakdown.by_fabric_type,
            style
                .and_then(|st| st.fabric_type.clone())
                .unwrap_or_else(|| "unspecified".to_string()),
            value,
        );
    }

    for job in jobs
        .iter()
        .filter(|j| statuses.completed.contains(&j.status) && window.contains(j.completed_at()))
    {
        let price = unit_price(catalogue, job.style_id).unwrap_or(Decimal::ZERO);
        add(
            &mut breakdown.by_tailor,
            job.tailor_id.to_string(),
            Decimal::from(job.returned_pcs) * price,
        );
    }

    breakdown
}

pub fn inventory_turnover(opening: i64, closing: i64, pcs_shipped: i64, days: i64) -> InventoryTurnover {
    let average = Decimal::from(opening + closing) / Decimal::TWO;

    let turnover = if average > Decimal::ZERO {
        (Decimal::from(pcs_shipped) / average).round_dp(2)
    } else {
        Decimal::ZERO
    };
    let days_on_hand = if turnover.is_zero() {
        Decimal::ZERO
    } else {
        (Decimal::from(days) / turnover).round_dp(2)
    };

    InventoryTurnover {
        opening_stock_pcs: opening,
        closing_stock_pcs: closing,
        average_stock_pcs: average,
        pcs_shipped,
        turnover,
        days_on_hand,
    }
}

fn unit_price(catalogue: &HashMap<Uuid, StyleRef>, style_id: Uuid) -> Option<Decimal> {
    catalogue.get(&style_id).and_then(|s| s.unit_price)
}

fn add(map: &mut BTreeMap<String, Decimal>, key: String, value: Decimal) {
    *map.entry(key).or_insert(Decimal::ZERO) += value;
}

// =========================================================================
//  ENGINE
// =========================================================================

/// Financial period-closing engine: derives P&L rollups for every period that
/// closes on a given day and upserts them into `financial_periods`.
#[derive(Clone)]
pub struct FinancialPeriodService {
    source: Arc<dyn RawEventSource>,
    store: Arc<dyn FinancialPeriodStore>,
    statuses: Arc<StatusSets>,
    rates: CostRates,
    clock: BusinessClock,
}

impl FinancialPeriodService {
    pub fn new(
        source: Arc<dyn RawEventSource>,
        store: Arc<dyn FinancialPeriodStore>,
        statuses: Arc<StatusSets>,
        rates: CostRates,
        clock: BusinessClock,
    ) -> Self {
        Self { source, store, statuses, rates, clock }
    }

    async fn catalogue(&self, tenant_id: Uuid) -> Result<HashMap<Uuid, StyleRef>, AppError> {
        let styles = self.source.styles(tenant_id).await?;
        Ok(styles.into_iter().map(|s| (s.id, s)).collect())
    }

    pub async fn calculate_revenue(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<RevenueSummary, AppError> {
        let (catalogue, shipments) =
            tokio::try_join!(self.catalogue(tenant_id), self.source.shipments(tenant_id, window))?;
        Ok(revenue_summary(&shipments, &self.statuses, &catalogue))
    }

    pub async fn calculate_costs(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<CostBreakdown, AppError> {
        let (cuttings, payments) = tokio::try_join!(
            self.source.cutting_events(tenant_id, window),
            self.source.tailor_payments(tenant_id, window),
        )?;
        Ok(cost_breakdown(&cuttings, &payments, &self.rates, window_days(&window)))
    }

    pub async fn calculate_pl_statement(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<PlStatement, AppError> {
        let (revenue, costs) = tokio::try_join!(
            self.calculate_revenue(tenant_id, window),
            self.calculate_costs(tenant_id, window),
        )?;
        Ok(pl_statement(revenue.total, &costs, self.rates.tax_rate_pct))
    }

    pub async fn calculate_revenue_breakdown(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<RevenueBreakdown, AppError> {
        let (catalogue, shipments, jobs) = tokio::try_join!(
            self.catalogue(tenant_id),
            self.source.shipments(tenant_id, window),
            self.source.production_jobs(tenant_id, window),
        )?;
        Ok(revenue_breakdown(&window, &shipments, &jobs, &self.statuses, &catalogue))
    }

    pub async fn calculate_inventory_turnover(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<InventoryTurnover, AppError> {
        let (opening, closing, revenue) = tokio::try_join!(
            self.source.stock_pieces_at(tenant_id, window.start),
            self.source.stock_pieces_at(tenant_id, window.end),
            self.calculate_revenue(tenant_id, window),
        )?;
        Ok(inventory_turnover(opening, closing, revenue.pcs_shipped, window_days(&window)))
    }

    /// Builds the full period row. Nothing is written.
    pub async fn compute_period(
        &self,
        tenant_id: Uuid,
        period: &PeriodWindow,
    ) -> Result<FinancialPeriod, AppError> {
        let window = self.clock.range_window(period.start_date, period.end_date);

        let (catalogue, shipments, jobs, cuttings, payments, opening, closing) = tokio::try_join!(
            self.catalogue(tenant_id),
            self.source.shipments(tenant_id, window),
            self.source.production_jobs(tenant_id, window),
            self.source.cutting_events(tenant_id, window),
            self.source.tailor_payments(tenant_id, window),
            self.source.stock_pieces_at(tenant_id, window.start),
            self.source.stock_pieces_at(tenant_id, window.end),
        )?;

        let days = period.num_days();
        let revenue = revenue_summary(&shipments, &self.statuses, &catalogue);
        let costs = cost_breakdown(&cuttings, &payments, &self.rates, days);
        let pl = pl_statement(revenue.total, &costs, self.rates.tax_rate_pct);
        let breakdown = revenue_breakdown(&window, &shipments, &jobs, &self.statuses, &catalogue);
        let inventory = inventory_turnover(opening, closing, revenue.pcs_shipped, days);

        Ok(FinancialPeriod {
            tenant_id,
            period_type: period.period_type,
            period_key: period.period_key.clone(),
            start_date: period.start_date,
            end_date: period.end_date,
            revenue: revenue.total,
            revenue_breakdown: breakdown,
            costs,
            gross_profit: pl.gross_profit,
            gross_profit_margin: pl.gross_profit_margin,
            ebitda: pl.ebitda,
            operating_profit: pl.operating_profit,
            operating_margin: pl.operating_margin,
            taxes: pl.taxes,
            net_profit: pl.net_profit,
            net_profit_margin: pl.net_profit_margin,
            inventory_turnover: inventory.turnover,
            inventory,
            is_finalized: false,
            updated_at: Utc::now(),
        })
    }

    /// Computes and upserts every period that closes on `date` (daily always).
    pub async fn close_periods(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<PeriodRunSummary>, AppError> {
        let mut summaries = Vec::new();

        for period in periods_closing_on(date) {
            let row = self.compute_period(tenant_id, &period).await?;
            let status = self.store.upsert_period(&row).await?;

            tracing::info!(
                %tenant_id,
                period_type = %period.period_type,
                period_key = %period.period_key,
                revenue = %row.revenue,
                net_profit = %row.net_profit,
                ?status,
                "Financial period closed"
            );

            summaries.push(PeriodRunSummary {
                period_type: period.period_type,
                period_key: period.period_key,
                start_date: period.start_date,
                end_date: period.end_date,
                revenue: row.revenue,
                net_profit: row.net_profit,
                status,
            });
        }

        Ok(summaries)
    }

    /// Locks a period against further recomputation. No route calls this yet.
    pub async fn finalize_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<bool, AppError> {
        let found = self.store.finalize_period(tenant_id, period_type, period_key).await?;
        if found {
            tracing::info!(%tenant_id, %period_type, period_key, "Financial period finalized");
        }
        Ok(found)
    }

    /// Checks the stored running balances of the ledger entries posted on `date`.
    pub async fn reconcile_ledger(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<LedgerDrift>, AppError> {
        let entries = self
            .source
            .tailor_payments(tenant_id, self.clock.day_window(date))
            .await?;
        let drifts = ledger::reconcile(&entries);

        for drift in &drifts {
            tracing::warn!(
                %tenant_id,
                entry_id = %drift.entry_id,
                tailor_id = %drift.tailor_id,
                stored = %drift.stored_balance,
                expected = %drift.expected_balance,
                "Tailor ledger running balance drift"
            );
        }

        Ok(drifts)
    }
}

fn window_days(window: &TimeWindow) -> i64 {
    (window.end - window.start).num_days()
}
