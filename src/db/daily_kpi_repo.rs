// src/db/daily_kpi_repo.rs

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    common::{dates::DateRange, error::AppError},
    db::stores::DailyKpiStore,
    models::analytics::DailyKpi,
};

#[derive(Clone)]
pub struct DailyKpiRepository {
    pool: PgPool,
}

impl DailyKpiRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DailyKpiStore for DailyKpiRepository {
    async fn replace_day(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
        rows: &[DailyKpi],
    ) -> Result<usize, AppError> {
        // One transaction per (tenant, date): concurrent refreshes of the same day
        // serialize on the row locks and both leave the same final state.
        let mut tx = self.pool.begin().await?;

        // 1. Upsert every row, setting (never incrementing) each field.
        //    Unchanged rows are not rewritten, so updated_at stays stable on re-runs.
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO daily_kpi (
                    tenant_id, kpi_date, style_id, vendor_id,
                    cutting_received_pcs, in_production_pcs, in_production_orders,
                    completed_pcs, shipped_pcs, pending_from_tailors_pcs,
                    expected_receivable_amount, tailor_expense_amount,
                    tailor_lines, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (tenant_id, kpi_date, style_id) DO UPDATE SET
                    vendor_id = EXCLUDED.vendor_id,
                    cutting_received_pcs = EXCLUDED.cutting_received_pcs,
                    in_production_pcs = EXCLUDED.in_production_pcs,
                    in_production_orders = EXCLUDED.in_production_orders,
                    completed_pcs = EXCLUDED.completed_pcs,
                    shipped_pcs = EXCLUDED.shipped_pcs,
                    pending_from_tailors_pcs = EXCLUDED.pending_from_tailors_pcs,
                    expected_receivable_amount = EXCLUDED.expected_receivable_amount,
                    tailor_expense_amount = EXCLUDED.tailor_expense_amount,
                    tailor_lines = EXCLUDED.tailor_lines,
                    updated_at = EXCLUDED.updated_at
                WHERE (
                    daily_kpi.vendor_id, daily_kpi.cutting_received_pcs,
                    daily_kpi.in_production_pcs, daily_kpi.in_production_orders,
                    daily_kpi.completed_pcs, daily_kpi.shipped_pcs,
                    daily_kpi.pending_from_tailors_pcs, daily_kpi.expected_receivable_amount,
                    daily_kpi.tailor_expense_amount, daily_kpi.tailor_lines
                ) IS DISTINCT FROM (
                    EXCLUDED.vendor_id, EXCLUDED.cutting_received_pcs,
                    EXCLUDED.in_production_pcs, EXCLUDED.in_production_orders,
                    EXCLUDED.completed_pcs, EXCLUDED.shipped_pcs,
                    EXCLUDED.pending_from_tailors_pcs, EXCLUDED.expected_receivable_amount,
                    EXCLUDED.tailor_expense_amount, EXCLUDED.tailor_lines
                )
                "#,
            )
                .bind(tenant_id)
                .bind(date)
                .bind(row.style_id)
                .bind(row.vendor_id)
                .bind(row.cutting_received_pcs)
                .bind(row.in_production_pcs)
                .bind(row.in_production_orders)
                .bind(row.completed_pcs)
                .bind(row.shipped_pcs)
                .bind(row.pending_from_tailors_pcs)
                .bind(row.expected_receivable_amount)
                .bind(row.tailor_expense_amount)
                .bind(Json(&row.tailor_lines))
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        // 2. Styles that lost all activity since the previous run disappear.
        let style_ids: Vec<Uuid> = rows.iter().map(|r| r.style_id).collect();
        sqlx::query(
            "DELETE FROM daily_kpi WHERE tenant_id = $1 AND kpi_date = $2 AND NOT (style_id = ANY($3))",
        )
            .bind(tenant_id)
            .bind(date)
            .bind(&style_ids)
            .execute(&mut *tx)
            .await?;

        // 3. Mark the day as covered by a rollup.
        sqlx::query(
            r#"
            INSERT INTO rollup_runs (tenant_id, kpi_date, row_count, refreshed_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (tenant_id, kpi_date) DO UPDATE SET
                row_count = EXCLUDED.row_count,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
            .bind(tenant_id)
            .bind(date)
            .bind(rows.len() as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(rows.len())
    }

    async fn find_range(&self, tenant_id: Uuid, range: DateRange) -> Result<Vec<DailyKpi>, AppError> {
        let rows = sqlx::query_as::<_, DailyKpi>(
            r#"
            SELECT
                tenant_id, kpi_date, style_id, vendor_id,
                cutting_received_pcs, in_production_pcs, in_production_orders,
                completed_pcs, shipped_pcs, pending_from_tailors_pcs,
                expected_receivable_amount, tailor_expense_amount,
                tailor_lines, updated_at
            FROM daily_kpi
            WHERE tenant_id = $1
              AND kpi_date BETWEEN $2 AND $3
            ORDER BY kpi_date ASC, style_id ASC
            "#,
        )
            .bind(tenant_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn covered_dates(
        &self,
        tenant_id: Uuid,
        range: DateRange,
    ) -> Result<BTreeSet<NaiveDate>, AppError> {
        let dates = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT kpi_date FROM rollup_runs WHERE tenant_id = $1 AND kpi_date BETWEEN $2 AND $3",
        )
            .bind(tenant_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(dates.into_iter().collect())
    }
}
