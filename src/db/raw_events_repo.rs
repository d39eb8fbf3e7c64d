// src/db/raw_events_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{dates::TimeWindow, error::AppError},
    db::stores::RawEventSource,
    models::raw_events::{
        DimensionRef, RawCuttingEvent, RawProductionJob, RawShipment, RawTailorPaymentEntry, StyleRef,
    },
};

#[derive(Clone)]
pub struct RawEventRepository {
    pool: PgPool,
}

impl RawEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawEventSource for RawEventRepository {
    async fn tenant_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tenant_id FROM styles ORDER BY tenant_id",
        )
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    // =========================================================================
    //  CATALOGUE (labels and ownership)
    // =========================================================================

    async fn styles(&self, tenant_id: Uuid) -> Result<Vec<StyleRef>, AppError> {
        let styles = sqlx::query_as::<_, StyleRef>(
            r#"
            SELECT id, tenant_id, vendor_id, name, unit_price, fabric_type
            FROM styles
            WHERE tenant_id = $1
            ORDER BY name ASC
            "#,
        )
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(styles)
    }

    async fn vendors(&self, tenant_id: Uuid) -> Result<Vec<DimensionRef>, AppError> {
        let vendors = sqlx::query_as::<_, DimensionRef>(
            "SELECT id, tenant_id, name FROM vendors WHERE tenant_id = $1 ORDER BY name ASC",
        )
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(vendors)
    }

    async fn tailors(&self, tenant_id: Uuid) -> Result<Vec<DimensionRef>, AppError> {
        let tailors = sqlx::query_as::<_, DimensionRef>(
            "SELECT id, tenant_id, name FROM tailors WHERE tenant_id = $1 ORDER BY name ASC",
        )
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(tailors)
    }

    // =========================================================================
    //  EVENTS
    // =========================================================================

    async fn cutting_events(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawCuttingEvent>, AppError> {
        let events = sqlx::query_as::<_, RawCuttingEvent>(
            r#"
            SELECT
                id, tenant_id, style_id, vendor_id,
                quantity_received::BIGINT AS quantity_received,
                fabric_meters, occurred_at
            FROM fabric_cuttings
            WHERE tenant_id = $1
              AND occurred_at >= $2
              AND occurred_at < $3
            "#,
        )
            .bind(tenant_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn production_jobs(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawProductionJob>, AppError> {
        // Jobs carry no tenant of their own; it comes from the style.
        let jobs = sqlx::query_as::<_, RawProductionJob>(
            r#"
            SELECT
                j.id, s.tenant_id, j.style_id, j.tailor_id, j.fabric_cutting_id,
                j.issued_pcs::BIGINT AS issued_pcs,
                j.returned_pcs::BIGINT AS returned_pcs,
                j.rate, j.status::TEXT AS status, j.issue_date, j.completed_date
            FROM production_jobs j
            JOIN styles s ON s.id = j.style_id
            WHERE s.tenant_id = $1
              AND (
                    (j.issue_date >= $2 AND j.issue_date < $3)
                 OR (j.completed_date >= $2 AND j.completed_date < $3)
              )
            "#,
        )
            .bind(tenant_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    async fn shipments(&self, tenant_id: Uuid, window: TimeWindow) -> Result<Vec<RawShipment>, AppError> {
        let shipments = sqlx::query_as::<_, RawShipment>(
            r#"
            SELECT
                id, tenant_id, style_id, vendor_id,
                pcs_shipped::BIGINT AS pcs_shipped,
                invoice_value,
                payment_status::TEXT AS payment_status,
                shipment_status::TEXT AS shipment_status,
                size, shipped_at
            FROM shipments
            WHERE tenant_id = $1
              AND shipped_at >= $2
              AND shipped_at < $3
            "#,
        )
            .bind(tenant_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(shipments)
    }

    async fn tailor_payments(
        &self,
        tenant_id: Uuid,
        window: TimeWindow,
    ) -> Result<Vec<RawTailorPaymentEntry>, AppError> {
        let entries = sqlx::query_as::<_, RawTailorPaymentEntry>(
            r#"
            SELECT
                p.id, t.tenant_id, p.tailor_id,
                p.entry_type::TEXT AS entry_type,
                p.amount, p.running_balance_after, p.occurred_at
            FROM tailor_payments p
            JOIN tailors t ON t.id = p.tailor_id
            WHERE t.tenant_id = $1
              AND p.occurred_at >= $2
              AND p.occurred_at < $3
            ORDER BY p.tailor_id, p.occurred_at, p.id
            "#,
        )
            .bind(tenant_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    async fn stock_pieces_at(&self, tenant_id: Uuid, at: DateTime<Utc>) -> Result<i64, AppError> {
        let stock = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT
                (SELECT COALESCE(SUM(quantity_received), 0)
                   FROM fabric_cuttings
                  WHERE tenant_id = $1 AND occurred_at < $2)::BIGINT
              - (SELECT COALESCE(SUM(pcs_shipped), 0)
                   FROM shipments
                  WHERE tenant_id = $1 AND shipped_at < $2)::BIGINT
            "#,
        )
            .bind(tenant_id)
            .bind(at)
            .fetch_one(&self.pool)
            .await?;

        Ok(stock)
    }
}
