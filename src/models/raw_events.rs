// src/models/raw_events.rs
//
// Read-only views over the operational tables owned by the portal.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawCuttingEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub style_id: Uuid,
    pub vendor_id: Uuid,
    pub quantity_received: i64,
    pub fabric_meters: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawProductionJob {
    pub id: Uuid,
    // Not stored on the job: joined in through the style.
    pub tenant_id: Uuid,
    pub style_id: Uuid,
    pub tailor_id: Uuid,
    pub fabric_cutting_id: Option<Uuid>,
    pub issued_pcs: i64,
    pub returned_pcs: i64,
    pub rate: Decimal,
    pub status: String,
    pub issue_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
}

impl RawProductionJob {
    /// When the job counts as completed; jobs closed without a completion date
    /// fall back to the day they were issued.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_date.unwrap_or(self.issue_date)
    }

    pub fn pending_pcs(&self) -> i64 {
        (self.issued_pcs - self.returned_pcs).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawShipment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub style_id: Uuid,
    pub vendor_id: Uuid,
    pub pcs_shipped: i64,
    pub invoice_value: Option<Decimal>,
    pub payment_status: String,
    pub shipment_status: String,
    pub size: Option<String>,
    pub shipped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentEntryType {
    Earning,
    Payout,
    Advance,
    Deduction,
}

impl PaymentEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEntryType::Earning => "earning",
            PaymentEntryType::Payout => "payout",
            PaymentEntryType::Advance => "advance",
            PaymentEntryType::Deduction => "deduction",
        }
    }
}

impl fmt::Display for PaymentEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PaymentEntryType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "earning" => Ok(PaymentEntryType::Earning),
            "payout" => Ok(PaymentEntryType::Payout),
            "advance" => Ok(PaymentEntryType::Advance),
            "deduction" => Ok(PaymentEntryType::Deduction),
            _ => Err(AppError::InvalidInput(format!("Unknown ledger entry type '{}'.", value))),
        }
    }
}

/// One line of the append-only tailor ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawTailorPaymentEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub tailor_id: Uuid,
    #[sqlx(try_from = "String")]
    pub entry_type: PaymentEntryType,
    pub amount: Decimal,
    pub running_balance_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StyleRef {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub unit_price: Option<Decimal>,
    pub fabric_type: Option<String>,
}

/// Id + display name of a vendor or tailor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRef {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
}
