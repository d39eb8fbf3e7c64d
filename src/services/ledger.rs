// src/services/ledger.rs
//
// Tailor ledger arithmetic. The ledger is append-only and every entry stores
// the running balance after it; these helpers recompute that balance from the
// entries themselves so the stored value can be checked.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::raw_events::{PaymentEntryType, RawTailorPaymentEntry};

/// Balance after applying one entry. Earnings are owed to the tailor; every
/// other entry type reduces what is owed.
pub fn apply_entry(balance: Decimal, entry_type: PaymentEntryType, amount: Decimal) -> Decimal {
    match entry_type {
        PaymentEntryType::Earning => balance + amount,
        PaymentEntryType::Payout | PaymentEntryType::Advance | PaymentEntryType::Deduction => {
            balance - amount
        }
    }
}

pub fn fold_balance<'a, I>(opening: Decimal, entries: I) -> Decimal
where
    I: IntoIterator<Item = &'a RawTailorPaymentEntry>,
{
    entries
        .into_iter()
        .fold(opening, |balance, e| apply_entry(balance, e.entry_type, e.amount))
}

/// An entry whose stored running balance disagrees with the recomputed one.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDrift {
    pub entry_id: Uuid,
    pub tailor_id: Uuid,
    pub stored_balance: Decimal,
    pub expected_balance: Decimal,
}

/// Recomputes every tailor's running balance and reports each drifting entry.
///
/// `entries` must be ordered by tailor, then time. The balance before a tailor's
/// first entry is implied by that entry's own stored value, so a window that
/// starts mid-ledger is checked consistently.
pub fn reconcile(entries: &[RawTailorPaymentEntry]) -> Vec<LedgerDrift> {
    let mut balances: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    let mut drifts = Vec::new();

    for entry in entries {
        let expected = match balances.get(&entry.tailor_id) {
            Some(previous) => apply_entry(*previous, entry.entry_type, entry.amount),
            None => entry.running_balance_after,
        };

        if expected != entry.running_balance_after {
            drifts.push(LedgerDrift {
                entry_id: entry.id,
                tailor_id: entry.tailor_id,
                stored_balance: entry.running_balance_after,
                expected_balance: expected,
            });
        }

        // Later entries are checked against the recomputed value, not the stored one.
        balances.insert(entry.tailor_id, expected);
    }

    drifts
}

/// Σ earnings − Σ deductions: what the tailors' work cost in the window.
/// Payouts and advances move cash but are not a cost.
pub fn tailoring_cost<'a, I>(entries: I) -> Decimal
where
    I: IntoIterator<Item = &'a RawTailorPaymentEntry>,
{
    entries.into_iter().fold(Decimal::ZERO, |acc, e| match e.entry_type {
        PaymentEntryType::Earning => acc + e.amount,
        PaymentEntryType::Deduction => acc - e.amount,
        PaymentEntryType::Payout | PaymentEntryType::Advance => acc,
    })
}
