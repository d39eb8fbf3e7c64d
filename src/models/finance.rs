// src/models/finance.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 5] = [
        PeriodType::Daily,
        PeriodType::Weekly,
        PeriodType::Monthly,
        PeriodType::Quarterly,
        PeriodType::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
            PeriodType::Yearly => "yearly",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PeriodType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PeriodType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown period type '{}'.", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodWriteStatus {
    Written,
    SkippedFinalized,
}

// --- Computations ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    #[schema(example = "125000.00")]
    pub total: Decimal,
    pub shipment_count: i64,
    pub pcs_shipped: i64,
}

/// Named cost line items for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub fabric_cost: Decimal,
    pub tailoring_cost: Decimal,
    pub direct_costs: Decimal,
    pub operating_overhead: Decimal,
    pub depreciation: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlStatement {
    pub revenue: Decimal,
    pub direct_costs: Decimal,
    pub gross_profit: Decimal,
    #[schema(example = "32.50")]
    pub gross_profit_margin: Decimal,
    pub operating_overhead: Decimal,
    pub ebitda: Decimal,
    pub depreciation: Decimal,
    pub operating_profit: Decimal,
    pub operating_margin: Decimal,
    pub interest: Decimal,
    pub taxes: Decimal,
    pub net_profit: Decimal,
    pub net_profit_margin: Decimal,
}

/// Revenue split by dimension. Keys are ids (or the raw size / fabric label).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueBreakdown {
    pub by_vendor: BTreeMap<String, Decimal>,
    pub by_style: BTreeMap<String, Decimal>,
    pub by_tailor: BTreeMap<String, Decimal>,
    pub by_size: BTreeMap<String, Decimal>,
    pub by_fabric_type: BTreeMap<String, Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTurnover {
    pub opening_stock_pcs: i64,
    pub closing_stock_pcs: i64,
    pub average_stock_pcs: Decimal,
    pub pcs_shipped: i64,
    pub turnover: Decimal,
    pub days_on_hand: Decimal,
}

// --- Stored period ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialPeriod {
    #[schema(ignore)]
    pub tenant_id: Uuid,

    #[sqlx(try_from = "String")]
    pub period_type: PeriodType,

    #[schema(example = "2024-W11")]
    pub period_key: String,

    #[schema(value_type = String, format = Date, example = "2024-03-11")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2024-03-17")]
    pub end_date: NaiveDate,

    pub revenue: Decimal,
    #[sqlx(json)]
    pub revenue_breakdown: RevenueBreakdown,
    #[sqlx(json)]
    pub costs: CostBreakdown,

    pub gross_profit: Decimal,
    pub gross_profit_margin: Decimal,
    pub ebitda: Decimal,
    pub operating_profit: Decimal,
    pub operating_margin: Decimal,
    pub taxes: Decimal,
    pub net_profit: Decimal,
    pub net_profit_margin: Decimal,

    #[sqlx(json)]
    pub inventory: InventoryTurnover,
    pub inventory_turnover: Decimal,

    pub is_finalized: bool,
    pub updated_at: DateTime<Utc>,
}

/// What the scheduler reports for each period it touched.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRunSummary {
    pub period_type: PeriodType,
    pub period_key: String,
    #[schema(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_date: NaiveDate,
    pub revenue: Decimal,
    pub net_profit: Decimal,
    pub status: PeriodWriteStatus,
}
