// src/db/financial_period_repo.rs

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::stores::FinancialPeriodStore,
    models::finance::{FinancialPeriod, PeriodType, PeriodWriteStatus},
};

#[derive(Clone)]
pub struct FinancialPeriodRepository {
    pool: PgPool,
}

impl FinancialPeriodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FinancialPeriodStore for FinancialPeriodRepository {
    async fn upsert_period(&self, period: &FinancialPeriod) -> Result<PeriodWriteStatus, AppError> {
        // The WHERE on the conflict branch leaves finalized periods alone; in that
        // case nothing is returned.
        let written = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO financial_periods (
                tenant_id, period_type, period_key, start_date, end_date,
                revenue, revenue_breakdown, costs,
                gross_profit, gross_profit_margin, ebitda,
                operating_profit, operating_margin, taxes,
                net_profit, net_profit_margin,
                inventory, inventory_turnover,
                is_finalized, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, FALSE, $19)
            ON CONFLICT (tenant_id, period_type, period_key) DO UPDATE SET
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                revenue = EXCLUDED.revenue,
                revenue_breakdown = EXCLUDED.revenue_breakdown,
                costs = EXCLUDED.costs,
                gross_profit = EXCLUDED.gross_profit,
                gross_profit_margin = EXCLUDED.gross_profit_margin,
                ebitda = EXCLUDED.ebitda,
                operating_profit = EXCLUDED.operating_profit,
                operating_margin = EXCLUDED.operating_margin,
                taxes = EXCLUDED.taxes,
                net_profit = EXCLUDED.net_profit,
                net_profit_margin = EXCLUDED.net_profit_margin,
                inventory = EXCLUDED.inventory,
                inventory_turnover = EXCLUDED.inventory_turnover,
                is_finalized = FALSE,
                updated_at = EXCLUDED.updated_at
            WHERE financial_periods.is_finalized = FALSE
            RETURNING period_key
            "#,
        )
            .bind(period.tenant_id)
            .bind(period.period_type.as_str())
            .bind(&period.period_key)
            .bind(period.start_date)
            .bind(period.end_date)
            .bind(period.revenue)
            .bind(Json(&period.revenue_breakdown))
            .bind(Json(&period.costs))
            .bind(period.gross_profit)
            .bind(period.gross_profit_margin)
            .bind(period.ebitda)
            .bind(period.operating_profit)
            .bind(period.operating_margin)
            .bind(period.taxes)
            .bind(period.net_profit)
            .bind(period.net_profit_margin)
            .bind(Json(&period.inventory))
            .bind(period.inventory_turnover)
            .bind(period.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match written {
            Some(_) => PeriodWriteStatus::Written,
            None => PeriodWriteStatus::SkippedFinalized,
        })
    }

    async fn find_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<Option<FinancialPeriod>, AppError> {
        let period = sqlx::query_as::<_, FinancialPeriod>(
            r#"
            SELECT
                tenant_id, period_type, period_key, start_date, end_date,
                revenue, revenue_breakdown, costs,
                gross_profit, gross_profit_margin, ebitda,
                operating_profit, operating_margin, taxes,
                net_profit, net_profit_margin,
                inventory, inventory_turnover,
                is_finalized, updated_at
            FROM financial_periods
            WHERE tenant_id = $1 AND period_type = $2 AND period_key = $3
            "#,
        )
            .bind(tenant_id)
            .bind(period_type.as_str())
            .bind(period_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(period)
    }

    async fn finalize_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE financial_periods
            SET is_finalized = TRUE, updated_at = now()
            WHERE tenant_id = $1 AND period_type = $2 AND period_key = $3
            "#,
        )
            .bind(tenant_id)
            .bind(period_type.as_str())
            .bind(period_key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
