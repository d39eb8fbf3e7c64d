// src/common/status_sets.rs

use std::collections::BTreeSet;

/// Open set of status strings, compared case- and separator-insensitively
/// ("In_Progress", "in progress" and "in-progress" are the same status).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSet(BTreeSet<String>);

impl StatusSet {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            statuses
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Parses a comma separated list, e.g. `"completed, returned"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, status: &str) -> bool {
        self.0.contains(&normalize(status))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn normalize(status: &str) -> String {
    status
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

/// Every status membership rule the engines rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSets {
    /// Job statuses whose returned pieces count as completed.
    pub completed: StatusSet,
    /// Job statuses still sitting with a tailor.
    pub in_production: StatusSet,
    /// Shipment statuses that mean goods left the floor and can be invoiced.
    pub receivable_shipment: StatusSet,
    /// Payment statuses that still leave money owed by the vendor.
    pub unpaid_payment: StatusSet,
}

impl Default for StatusSets {
    fn default() -> Self {
        Self {
            completed: StatusSet::new(["completed", "returned", "ready-to-ship", "shipped"]),
            in_production: StatusSet::new(["pending", "in-progress"]),
            receivable_shipment: StatusSet::new(["shipped", "delivered"]),
            unpaid_payment: StatusSet::new(["pending", "partial", "unpaid"]),
        }
    }
}

impl StatusSets {
    pub fn is_receivable(&self, shipment_status: &str, payment_status: &str) -> bool {
        self.receivable_shipment.contains(shipment_status)
            && self.unpaid_payment.contains(payment_status)
    }
}
