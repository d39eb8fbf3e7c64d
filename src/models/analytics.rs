// src/models/analytics.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::{dates::DateRange, error::AppError};

// =========================================================================
//  DERIVED STORE
// =========================================================================

/// Per-tailor sub-totals of one style on one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TailorKpiLine {
    pub tailor_id: Uuid,
    pub in_production_pcs: i64,
    pub in_production_orders: i64,
    pub completed_pcs: i64,
    pub pending_pcs: i64,
    pub expense_amount: Decimal,
}

/// One row of `daily_kpi`: a single style on a single business day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyKpi {
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub kpi_date: NaiveDate,
    pub style_id: Uuid,
    pub vendor_id: Option<Uuid>,

    pub cutting_received_pcs: i64,
    pub in_production_pcs: i64,
    pub in_production_orders: i64,
    pub completed_pcs: i64,
    pub shipped_pcs: i64,
    pub pending_from_tailors_pcs: i64,
    pub expected_receivable_amount: Decimal,
    pub tailor_expense_amount: Decimal,

    #[sqlx(json)]
    pub tailor_lines: Vec<TailorKpiLine>,

    pub updated_at: DateTime<Utc>,
}

impl DailyKpi {
    /// Equality of everything except `updated_at`.
    pub fn metrics_eq(&self, other: &DailyKpi) -> bool {
        self.tenant_id == other.tenant_id
            && self.kpi_date == other.kpi_date
            && self.style_id == other.style_id
            && self.vendor_id == other.vendor_id
            && self.cutting_received_pcs == other.cutting_received_pcs
            && self.in_production_pcs == other.in_production_pcs
            && self.in_production_orders == other.in_production_orders
            && self.completed_pcs == other.completed_pcs
            && self.shipped_pcs == other.shipped_pcs
            && self.pending_from_tailors_pcs == other.pending_from_tailors_pcs
            && self.expected_receivable_amount == other.expected_receivable_amount
            && self.tailor_expense_amount == other.tailor_expense_amount
            && self.tailor_lines == other.tailor_lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RefreshOutcome {
    pub success: bool,
    pub count: usize,
}

// =========================================================================
//  QUERY VOCABULARY
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    CuttingReceived,
    InProduction,
    InProductionOrders,
    PcsCompleted,
    PcsShipped,
    ExpectedReceivable,
    TailoringExpense,
    PendingFromTailors,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::CuttingReceived,
        Metric::InProduction,
        Metric::InProductionOrders,
        Metric::PcsCompleted,
        Metric::PcsShipped,
        Metric::ExpectedReceivable,
        Metric::TailoringExpense,
        Metric::PendingFromTailors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::CuttingReceived => "cuttingReceived",
            Metric::InProduction => "inProduction",
            Metric::InProductionOrders => "inProductionOrders",
            Metric::PcsCompleted => "pcsCompleted",
            Metric::PcsShipped => "pcsShipped",
            Metric::ExpectedReceivable => "expectedReceivable",
            Metric::TailoringExpense => "tailoringExpense",
            Metric::PendingFromTailors => "pendingFromTailors",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::CuttingReceived => "Cutting Received",
            Metric::InProduction => "In Production",
            Metric::InProductionOrders => "Orders In Production",
            Metric::PcsCompleted => "Pieces Completed",
            Metric::PcsShipped => "Pieces Shipped",
            Metric::ExpectedReceivable => "Expected Receivable",
            Metric::TailoringExpense => "Tailoring Expense",
            Metric::PendingFromTailors => "Pending From Tailors",
        }
    }

    /// Metrics that exist per tailor (and are the only ones a tailor may see).
    pub fn is_tailor_metric(&self) -> bool {
        matches!(
            self,
            Metric::InProduction
                | Metric::InProductionOrders
                | Metric::PcsCompleted
                | Metric::TailoringExpense
                | Metric::PendingFromTailors
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn squash(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for Metric {
    type Err = AppError;

    /// Accepts camelCase, snake_case and kebab-case spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = squash(value);
        Metric::ALL
            .into_iter()
            .find(|m| squash(m.as_str()) == wanted)
            .ok_or_else(|| AppError::InvalidMetric(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Style,
    Vendor,
    Tailor,
}

impl FromStr for GroupBy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "style" => Ok(GroupBy::Style),
            "vendor" => Ok(GroupBy::Vendor),
            "tailor" => Ok(GroupBy::Tailor),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown groupBy '{}' (expected style, vendor or tailor).",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl FromStr for Granularity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown granularity '{}' (expected day, week or month).",
                value
            ))),
        }
    }
}

/// Optional dimension filters applied on top of the actor scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub style_ids: Vec<Uuid>,
    pub vendor_ids: Vec<Uuid>,
}

impl QueryFilters {
    pub fn parse(style_ids: Option<&str>, vendor_ids: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            style_ids: parse_id_list("styleIds", style_ids)?,
            vendor_ids: parse_id_list("vendorIds", vendor_ids)?,
        })
    }

    pub fn matches(&self, style_id: Uuid, vendor_id: Option<Uuid>) -> bool {
        let style_ok = self.style_ids.is_empty() || self.style_ids.contains(&style_id);
        let vendor_ok = self.vendor_ids.is_empty()
            || vendor_id.is_some_and(|v| self.vendor_ids.contains(&v));
        style_ok && vendor_ok
    }
}

fn parse_id_list(name: &str, raw: Option<&str>) -> Result<Vec<Uuid>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| AppError::InvalidInput(format!("'{}' in {} is not a valid id.", s, name)))
        })
        .collect()
}

// =========================================================================
//  METRIC ARITHMETIC
// =========================================================================

/// Additive bag of every metric; summing these is how ranges are answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricValues {
    pub cutting_received_pcs: i64,
    pub in_production_pcs: i64,
    pub in_production_orders: i64,
    pub completed_pcs: i64,
    pub shipped_pcs: i64,
    pub pending_from_tailors_pcs: i64,
    pub expected_receivable: Decimal,
    pub tailoring_expense: Decimal,
}

impl MetricValues {
    pub fn from_row(row: &DailyKpi) -> Self {
        Self {
            cutting_received_pcs: row.cutting_received_pcs,
            in_production_pcs: row.in_production_pcs,
            in_production_orders: row.in_production_orders,
            completed_pcs: row.completed_pcs,
            shipped_pcs: row.shipped_pcs,
            pending_from_tailors_pcs: row.pending_from_tailors_pcs,
            expected_receivable: row.expected_receivable_amount,
            tailoring_expense: row.tailor_expense_amount,
        }
    }

    pub fn from_tailor_line(line: &TailorKpiLine) -> Self {
        Self {
            in_production_pcs: line.in_production_pcs,
            in_production_orders: line.in_production_orders,
            completed_pcs: line.completed_pcs,
            pending_from_tailors_pcs: line.pending_pcs,
            tailoring_expense: line.expense_amount,
            ..Self::default()
        }
    }

    pub fn add(&mut self, other: &MetricValues) {
        self.cutting_received_pcs += other.cutting_received_pcs;
        self.in_production_pcs += other.in_production_pcs;
        self.in_production_orders += other.in_production_orders;
        self.completed_pcs += other.completed_pcs;
        self.shipped_pcs += other.shipped_pcs;
        self.pending_from_tailors_pcs += other.pending_from_tailors_pcs;
        self.expected_receivable += other.expected_receivable;
        self.tailoring_expense += other.tailoring_expense;
    }

    pub fn get(&self, metric: Metric) -> Decimal {
        match metric {
            Metric::CuttingReceived => Decimal::from(self.cutting_received_pcs),
            Metric::InProduction => Decimal::from(self.in_production_pcs),
            Metric::InProductionOrders => Decimal::from(self.in_production_orders),
            Metric::PcsCompleted => Decimal::from(self.completed_pcs),
            Metric::PcsShipped => Decimal::from(self.shipped_pcs),
            Metric::ExpectedReceivable => self.expected_receivable,
            Metric::TailoringExpense => self.tailoring_expense,
            Metric::PendingFromTailors => Decimal::from(self.pending_from_tailors_pcs),
        }
    }
}

// =========================================================================
//  RESPONSES
// =========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PiecesKpi {
    pub pcs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct InProductionKpi {
    pub pcs: i64,
    pub orders: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ShippedKpi {
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AmountKpi {
    pub amount: Decimal,
    #[schema(example = "INR")]
    pub currency: String,
}

/// KPI totals for a range. Entries a tailor may not see are omitted, not zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiSet {
    pub range: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutting_received: Option<PiecesKpi>,
    pub in_production: InProductionKpi,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcs_shipped: Option<ShippedKpi>,
    pub pcs_completed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_receivable: Option<AmountKpi>,
    pub tailoring_expense: Decimal,
    pub pending_from_tailors: i64,
}

impl KpiSet {
    pub fn from_values(range: DateRange, values: &MetricValues, currency: &str) -> Self {
        Self {
            range,
            cutting_received: Some(PiecesKpi { pcs: values.cutting_received_pcs }),
            in_production: InProductionKpi {
                pcs: values.in_production_pcs,
                orders: values.in_production_orders,
            },
            pcs_shipped: Some(ShippedKpi { total: values.shipped_pcs }),
            pcs_completed: values.completed_pcs,
            expected_receivable: Some(AmountKpi {
                amount: values.expected_receivable,
                currency: currency.to_string(),
            }),
            tailoring_expense: values.tailoring_expense,
            pending_from_tailors: values.pending_from_tailors_pcs,
        }
    }

    /// Drops every entry that is not a tailor metric.
    pub fn tailor_view(self) -> Self {
        Self {
            cutting_received: None,
            pcs_shipped: None,
            expected_receivable: None,
            ..self
        }
    }

    /// The metric's value; an omitted entry reads as zero.
    pub fn value(&self, metric: Metric) -> Decimal {
        match metric {
            Metric::CuttingReceived => self
                .cutting_received
                .as_ref()
                .map_or(Decimal::ZERO, |k| Decimal::from(k.pcs)),
            Metric::InProduction => Decimal::from(self.in_production.pcs),
            Metric::InProductionOrders => Decimal::from(self.in_production.orders),
            Metric::PcsCompleted => Decimal::from(self.pcs_completed),
            Metric::PcsShipped => self
                .pcs_shipped
                .as_ref()
                .map_or(Decimal::ZERO, |k| Decimal::from(k.total)),
            Metric::ExpectedReceivable => self
                .expected_receivable
                .as_ref()
                .map_or(Decimal::ZERO, |k| k.amount),
            Metric::TailoringExpense => self.tailoring_expense,
            Metric::PendingFromTailors => Decimal::from(self.pending_from_tailors),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiCard {
    #[schema(example = "pcsShipped")]
    pub id: String,
    pub label: String,
    pub value: Decimal,
    /// Percent change against the preceding range of equal length.
    pub trend: Decimal,
    pub trend_direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendPoint {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BreakdownEntry {
    pub key: String,
    pub label: String,
    pub value: Decimal,
    /// Share of the returned (limited) entries' total.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub style_id: Uuid,
    pub style_name: String,
    pub vendor_id: Option<Uuid>,
    pub vendor_name: Option<String>,
    pub cutting_received_pcs: i64,
    pub in_production_pcs: i64,
    pub in_production_orders: i64,
    pub completed_pcs: i64,
    pub shipped_pcs: i64,
    pub pending_from_tailors_pcs: i64,
    pub expected_receivable_amount: Decimal,
    pub tailoring_expense_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub rows: Vec<TableRow>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub kpis: KpiSet,
    pub trend: Vec<TrendPoint>,
    pub breakdown: Vec<BreakdownEntry>,
}
