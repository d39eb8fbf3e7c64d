// src/services/scope.rs
//
// Row visibility per role. The query service resolves one ResolvedScope per
// request and every read goes through it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        actor::{ActorContext, Role},
        analytics::{DailyKpi, GroupBy, Metric, MetricValues, QueryFilters},
        raw_events::StyleRef,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedScope {
    /// Actor without a tenant: every query answers with zeros.
    NoTenant,
    /// Admins and managers: the whole tenant.
    Tenant { tenant_id: Uuid },
    /// Styles the vendor owns, plus rows stamped with its vendor id.
    Vendor {
        tenant_id: Uuid,
        vendor_id: Uuid,
        style_ids: BTreeSet<Uuid>,
    },
    /// Only the tailor's own sub-totals.
    Tailor { tenant_id: Uuid, tailor_id: Uuid },
}

/// A visible slice of one `daily_kpi` row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedRow {
    pub date: NaiveDate,
    pub style_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub values: MetricValues,
}

impl ResolvedScope {
    /// `styles` is the tenant's style catalogue.
    pub fn resolve(actor: &ActorContext, styles: &[StyleRef]) -> Result<Self, AppError> {
        let Some(tenant_id) = actor.tenant_id else {
            return Ok(ResolvedScope::NoTenant);
        };

        match actor.role {
            Role::Admin | Role::Manager => Ok(ResolvedScope::Tenant { tenant_id }),
            Role::Vendor => {
                let vendor_id = actor.vendor_id.ok_or_else(|| {
                    AppError::Forbidden("Vendor account is not linked to a vendor.".to_string())
                })?;
                let style_ids = styles
                    .iter()
                    .filter(|s| s.tenant_id == tenant_id && s.vendor_id == vendor_id)
                    .map(|s| s.id)
                    .collect();
                Ok(ResolvedScope::Vendor { tenant_id, vendor_id, style_ids })
            }
            Role::Tailor => {
                let tailor_id = actor.tailor_id.ok_or_else(|| {
                    AppError::Forbidden("Tailor account is not linked to a tailor.".to_string())
                })?;
                Ok(ResolvedScope::Tailor { tenant_id, tailor_id })
            }
        }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            ResolvedScope::NoTenant => None,
            ResolvedScope::Tenant { tenant_id }
            | ResolvedScope::Vendor { tenant_id, .. }
            | ResolvedScope::Tailor { tenant_id, .. } => Some(*tenant_id),
        }
    }

    pub fn is_tailor(&self) -> bool {
        matches!(self, ResolvedScope::Tailor { .. })
    }

    // =========================================================================
    //  GUARDS
    // =========================================================================

    pub fn check_metric(&self, metric: Metric) -> Result<(), AppError> {
        if self.is_tailor() && !metric.is_tailor_metric() {
            return Err(AppError::Forbidden(format!(
                "Metric '{}' is not available to tailors.",
                metric
            )));
        }
        Ok(())
    }

    pub fn check_group_by(&self, group_by: GroupBy) -> Result<(), AppError> {
        if self.is_tailor() && group_by == GroupBy::Vendor {
            return Err(AppError::Forbidden(
                "Tailors cannot group analytics by vendor.".to_string(),
            ));
        }
        Ok(())
    }

    /// A vendor may only narrow to its own styles and its own vendor id.
    pub fn check_filters(&self, filters: &QueryFilters) -> Result<(), AppError> {
        if let ResolvedScope::Vendor { vendor_id, style_ids, .. } = self {
            if let Some(style) = filters.style_ids.iter().find(|s| !style_ids.contains(s)) {
                return Err(AppError::Forbidden(format!("Style {} is outside your scope.", style)));
            }
            if let Some(vendor) = filters.vendor_ids.iter().find(|v| *v != vendor_id) {
                return Err(AppError::Forbidden(format!("Vendor {} is outside your scope.", vendor)));
            }
        }
        Ok(())
    }

    // =========================================================================
    //  VISIBILITY
    // =========================================================================

    pub fn row_visible(&self, row: &DailyKpi) -> bool {
        match self {
            ResolvedScope::NoTenant => false,
            ResolvedScope::Tenant { tenant_id } => row.tenant_id == *tenant_id,
            ResolvedScope::Vendor { tenant_id, vendor_id, style_ids } => {
                row.tenant_id == *tenant_id
                    && (style_ids.contains(&row.style_id) || row.vendor_id == Some(*vendor_id))
            }
            ResolvedScope::Tailor { tenant_id, tailor_id } => {
                row.tenant_id == *tenant_id && row.tailor_lines.iter().any(|l| l.tailor_id == *tailor_id)
            }
        }
    }

    /// Metric values of `row` this scope may see. Tailors get their own line only.
    pub fn values_of(&self, row: &DailyKpi) -> MetricValues {
        match self {
            ResolvedScope::Tailor { tailor_id, .. } => row
                .tailor_lines
                .iter()
                .filter(|l| l.tailor_id == *tailor_id)
                .fold(MetricValues::default(), |mut acc, l| {
                    acc.add(&MetricValues::from_tailor_line(l));
                    acc
                }),
            _ => MetricValues::from_row(row),
        }
    }

    /// Per-tailor values of `row` this scope may see.
    pub fn tailor_slices(&self, row: &DailyKpi) -> Vec<(Uuid, MetricValues)> {
        row.tailor_lines
            .iter()
            .filter(|l| match self {
                ResolvedScope::Tailor { tailor_id, .. } => l.tailor_id == *tailor_id,
                _ => true,
            })
            .map(|l| (l.tailor_id, MetricValues::from_tailor_line(l)))
            .collect()
    }

    /// Visible rows matching `filters`, reduced to what the scope may see.
    pub fn project<'a, I>(&self, rows: I, filters: &QueryFilters) -> Vec<ScopedRow>
    where
        I: IntoIterator<Item = &'a DailyKpi>,
    {
        rows.into_iter()
            .filter(|r| self.row_visible(r) && filters.matches(r.style_id, r.vendor_id))
            .map(|r| ScopedRow {
                date: r.kpi_date,
                style_id: r.style_id,
                vendor_id: r.vendor_id,
                values: self.values_of(r),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::models::analytics::TailorKpiLine;

    fn style(tenant_id: Uuid, vendor_id: Uuid) -> StyleRef {
        StyleRef {
            id: Uuid::new_v4(),
            tenant_id,
            vendor_id,
            name: "Kurta".into(),
            unit_price: None,
            fabric_type: None,
        }
    }

    fn row(tenant_id: Uuid, style_id: Uuid, vendor_id: Uuid, lines: Vec<TailorKpiLine>) -> DailyKpi {
        DailyKpi {
            tenant_id,
            kpi_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            style_id,
            vendor_id: Some(vendor_id),
            cutting_received_pcs: 100,
            in_production_pcs: 0,
            in_production_orders: 0,
            completed_pcs: lines.iter().map(|l| l.completed_pcs).sum(),
            shipped_pcs: 20,
            pending_from_tailors_pcs: 0,
            expected_receivable_amount: Decimal::ZERO,
            tailor_expense_amount: lines.iter().map(|l| l.expense_amount).sum(),
            tailor_lines: lines,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn vendor_sees_only_its_styles() {
        let tenant = Uuid::new_v4();
        let (v1, v2) = (Uuid::new_v4(), Uuid::new_v4());
        let (s1, s2) = (style(tenant, v1), style(tenant, v2));
        let scope =
            ResolvedScope::resolve(&ActorContext::vendor(tenant, v1), &[s1.clone(), s2.clone()]).unwrap();

        assert!(scope.row_visible(&row(tenant, s1.id, v1, vec![])));
        assert!(!scope.row_visible(&row(tenant, s2.id, v2, vec![])));
        assert!(!scope.row_visible(&row(Uuid::new_v4(), s1.id, v1, vec![])));
    }

    #[test]
    fn vendor_filters_outside_scope_are_forbidden() {
        let tenant = Uuid::new_v4();
        let (v1, v2) = (Uuid::new_v4(), Uuid::new_v4());
        let s2 = style(tenant, v2);
        let scope = ResolvedScope::resolve(&ActorContext::vendor(tenant, v1), &[s2.clone()]).unwrap();

        let by_style = QueryFilters { style_ids: vec![s2.id], vendor_ids: vec![] };
        let by_vendor = QueryFilters { style_ids: vec![], vendor_ids: vec![v2] };
        assert!(matches!(scope.check_filters(&by_style), Err(AppError::Forbidden(_))));
        assert!(matches!(scope.check_filters(&by_vendor), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn tailor_sees_only_its_own_line() {
        let tenant = Uuid::new_v4();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let lines = vec![
            TailorKpiLine { tailor_id: t1, completed_pcs: 30, ..TailorKpiLine::default() },
            TailorKpiLine { tailor_id: t2, completed_pcs: 70, ..TailorKpiLine::default() },
        ];
        let r = row(tenant, Uuid::new_v4(), Uuid::new_v4(), lines);
        let scope = ResolvedScope::resolve(&ActorContext::tailor(tenant, t1), &[]).unwrap();

        let values = scope.values_of(&r);
        assert_eq!(values.completed_pcs, 30);
        assert_eq!(values.cutting_received_pcs, 0);
        assert_eq!(scope.tailor_slices(&r).len(), 1);
        assert!(scope.check_metric(Metric::PcsShipped).is_err());
        assert!(scope.check_group_by(GroupBy::Vendor).is_err());
    }

    #[test]
    fn unlinked_vendor_is_forbidden() {
        let mut actor = ActorContext::vendor(Uuid::new_v4(), Uuid::new_v4());
        actor.vendor_id = None;
        assert!(matches!(ResolvedScope::resolve(&actor, &[]), Err(AppError::Forbidden(_))));
    }
}
