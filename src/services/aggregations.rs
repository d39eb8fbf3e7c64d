// src/services/aggregations.rs
//
// The closed set of per-source folds used by the daily rollup. Each aggregation reads
// one kind of raw record and adds its contribution to the per-style totals.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{dates::TimeWindow, status_sets::StatusSets},
    models::{
        analytics::{DailyKpi, MetricValues, TailorKpiLine},
        raw_events::{RawCuttingEvent, RawProductionJob, RawShipment, StyleRef},
    },
};

/// Invoice value when present, otherwise pieces × the style's unit price.
pub fn shipment_value(shipment: &RawShipment, unit_price: Option<Decimal>) -> Decimal {
    shipment
        .invoice_value
        .unwrap_or_else(|| Decimal::from(shipment.pcs_shipped) * unit_price.unwrap_or(Decimal::ZERO))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleTotals {
    /// Vendor seen on the raw events, used when the style is missing from the catalogue.
    pub event_vendor_id: Option<Uuid>,
    pub values: MetricValues,
    pub tailors: BTreeMap<Uuid, TailorKpiLine>,
}

impl StyleTotals {
    fn tailor(&mut self, tailor_id: Uuid) -> &mut TailorKpiLine {
        self.tailors.entry(tailor_id).or_insert_with(|| TailorKpiLine {
            tailor_id,
            ..TailorKpiLine::default()
        })
    }
}

/// Per-style partials for one day. Any style touched by any source gets an
/// entry, with every other metric left at zero.
#[derive(Debug, Default)]
pub struct RollupAccumulator {
    styles: BTreeMap<Uuid, StyleTotals>,
}

impl RollupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(&mut self, style_id: Uuid) -> &mut StyleTotals {
        self.styles.entry(style_id).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn get(&self, style_id: &Uuid) -> Option<&StyleTotals> {
        self.styles.get(style_id)
    }

    /// Turns the partials into `daily_kpi` rows, ordered by style id.
    pub fn into_rows(
        self,
        tenant_id: Uuid,
        date: NaiveDate,
        catalogue: &HashMap<Uuid, StyleRef>,
        now: DateTime<Utc>,
    ) -> Vec<DailyKpi> {
        self.styles
            .into_iter()
            .map(|(style_id, totals)| {
                let vendor_id = catalogue
                    .get(&style_id)
                    .map(|s| s.vendor_id)
                    .or(totals.event_vendor_id);
                let values = totals.values;

                DailyKpi {
                    tenant_id,
                    kpi_date: date,
                    style_id,
                    vendor_id,
                    cutting_received_pcs: values.cutting_received_pcs,
                    in_production_pcs: values.in_production_pcs,
                    in_production_orders: values.in_production_orders,
                    completed_pcs: values.completed_pcs,
                    shipped_pcs: values.shipped_pcs,
                    pending_from_tailors_pcs: values.pending_from_tailors_pcs,
                    expected_receivable_amount: values.expected_receivable,
                    tailor_expense_amount: values.tailoring_expense,
                    tailor_lines: totals.tailors.into_values().collect(),
                    updated_at: now,
                }
            })
            .collect()
    }
}

/// One typed fold over a single raw source.
pub trait StyleAggregation {
    type Row;

    fn fold(&self, window: &TimeWindow, row: &Self::Row, acc: &mut RollupAccumulator);

    fn fold_all(&self, window: &TimeWindow, rows: &[Self::Row], acc: &mut RollupAccumulator) {
        for row in rows {
            self.fold(window, row, acc);
        }
    }
}

// =========================================================================
//  AGGREGATIONS
// =========================================================================

/// Σ pieces received from cutting.
pub struct CuttingReceived;

impl StyleAggregation for CuttingReceived {
    type Row = RawCuttingEvent;

    fn fold(&self, window: &TimeWindow, row: &RawCuttingEvent, acc: &mut RollupAccumulator) {
        if !window.contains(row.occurred_at) {
            return;
        }
        let totals = acc.style(row.style_id);
        totals.event_vendor_id.get_or_insert(row.vendor_id);
        totals.values.cutting_received_pcs += row.quantity_received;
    }
}

/// Work issued to and completed by tailors.
///
/// Issued side: jobs in an in-production status issued inside the window.
/// Completed side: jobs in a completed status whose completion falls inside
/// the window. Returned pieces on a job in any other status never count.
pub struct ProductionProgress<'a> {
    pub statuses: &'a StatusSets,
}

impl StyleAggregation for ProductionProgress<'_> {
    type Row = RawProductionJob;

    fn fold(&self, window: &TimeWindow, job: &RawProductionJob, acc: &mut RollupAccumulator) {
        let issued = self.statuses.in_production.contains(&job.status) && window.contains(job.issue_date);
        let completed =
            self.statuses.completed.contains(&job.status) && window.contains(job.completed_at());

        if !issued && !completed {
            return;
        }

        let totals = acc.style(job.style_id);

        if issued {
            let pending = job.pending_pcs();
            totals.values.in_production_pcs += job.issued_pcs;
            totals.values.in_production_orders += 1;
            totals.values.pending_from_tailors_pcs += pending;

            let line = totals.tailor(job.tailor_id);
            line.in_production_pcs += job.issued_pcs;
            line.in_production_orders += 1;
            line.pending_pcs += pending;
        }

        if completed {
            let expense = Decimal::from(job.returned_pcs) * job.rate;
            totals.values.completed_pcs += job.returned_pcs;
            totals.values.tailoring_expense += expense;

            let line = totals.tailor(job.tailor_id);
            line.completed_pcs += job.returned_pcs;
            line.expense_amount += expense;
        }
    }
}

/// Pieces shipped, and the value still owed on receivable shipments.
pub struct ShipmentsOut<'a> {
    pub statuses: &'a StatusSets,
    pub catalogue: &'a HashMap<Uuid, StyleRef>,
}

impl StyleAggregation for ShipmentsOut<'_> {
    type Row = RawShipment;

    fn fold(&self, window: &TimeWindow, row: &RawShipment, acc: &mut RollupAccumulator) {
        if !window.contains(row.shipped_at) {
            return;
        }
        let receivable = self
            .statuses
            .is_receivable(&row.shipment_status, &row.payment_status)
            .then(|| {
                let price = self.catalogue.get(&row.style_id).and_then(|s| s.unit_price);
                shipment_value(row, price)
            });

        let totals = acc.style(row.style_id);
        totals.event_vendor_id.get_or_insert(row.vendor_id);
        totals.values.shipped_pcs += row.pcs_shipped;
        if let Some(amount) = receivable {
            totals.values.expected_receivable += amount;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::dates::BusinessClock;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn job(status: &str, issued: i64, returned: i64, completed: bool) -> RawProductionJob {
        let window = BusinessClock::utc().day_window(day());
        let at = window.start + chrono::Duration::hours(10);
        RawProductionJob {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            style_id: Uuid::nil(),
            tailor_id: Uuid::nil(),
            fabric_cutting_id: None,
            issued_pcs: issued,
            returned_pcs: returned,
            rate: Decimal::new(12, 0),
            status: status.to_string(),
            issue_date: at,
            completed_date: completed.then_some(at),
        }
    }

    #[test]
    fn returned_pieces_count_only_for_completed_statuses() {
        let statuses = StatusSets::default();
        let window = BusinessClock::utc().day_window(day());
        let mut acc = RollupAccumulator::new();

        ProductionProgress { statuses: &statuses }.fold_all(
            &window,
            &[job("completed", 100, 100, true), job("in-progress", 80, 75, false)],
            &mut acc,
        );

        let totals = acc.get(&Uuid::nil()).unwrap();
        assert_eq!(totals.values.completed_pcs, 100);
        assert_eq!(totals.values.in_production_pcs, 80);
        assert_eq!(totals.values.pending_from_tailors_pcs, 5);
        assert_eq!(totals.values.tailoring_expense, Decimal::new(1200, 0));
    }

    #[test]
    fn shipment_value_falls_back_to_unit_price() {
        let shipment = RawShipment {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            style_id: Uuid::nil(),
            vendor_id: Uuid::nil(),
            pcs_shipped: 40,
            invoice_value: None,
            payment_status: "pending".into(),
            shipment_status: "shipped".into(),
            size: None,
            shipped_at: Utc::now(),
        };
        assert_eq!(shipment_value(&shipment, Some(Decimal::new(250, 1))), Decimal::new(1000, 0));
        assert_eq!(shipment_value(&shipment, None), Decimal::ZERO);
    }
}
