mod common;

use rust_decimal::Decimal;
use uuid::Uuid;

use common::{at, d, Fixture};
use manufacturing_analytics::common::error::AppError;

#[tokio::test]
async fn completed_pieces_count_only_completed_statuses() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);

    // 100 + 75 count; the in-progress job's 75 returned pieces do not.
    fx.add_job(fx.job(fx.style_a, fx.tailor_1, "completed", 100, 100, 10, at(day, 8), Some(at(day, 16)))).await;
    fx.add_job(fx.job(fx.style_a, fx.tailor_2, "returned", 80, 75, 12, at(day, 9), Some(at(day, 17)))).await;
    fx.add_job(fx.job(fx.style_a, fx.tailor_2, "in-progress", 100, 75, 12, at(day, 10), None)).await;

    fx.refresh(day).await;
    let rows = fx.store.daily_rows(fx.tenant, day).await;

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.completed_pcs, 175);
    assert_eq!(row.tailor_expense_amount, Decimal::from(100 * 10 + 75 * 12));
    assert_eq!(row.in_production_pcs, 100);
    assert_eq!(row.in_production_orders, 1);
    assert_eq!(row.pending_from_tailors_pcs, 25);

    let t2 = row.tailor_lines.iter().find(|l| l.tailor_id == fx.tailor_2).unwrap();
    assert_eq!(t2.completed_pcs, 75);
    assert_eq!(t2.in_production_pcs, 100);
}

#[tokio::test]
async fn expected_receivable_counts_unpaid_shipments_that_left() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);

    fx.shipment(fx.style_a, 50, Some(10_000), "shipped", "pending", at(day, 9)).await;
    fx.shipment(fx.style_a, 20, Some(4_000), "delivered", "partial", at(day, 10)).await;
    // Paid, or not yet shipped: not receivable.
    fx.shipment(fx.style_a, 25, Some(5_000), "shipped", "paid", at(day, 11)).await;
    fx.shipment(fx.style_a, 15, Some(3_000), "packed", "unpaid", at(day, 12)).await;

    fx.refresh(day).await;
    let rows = fx.store.daily_rows(fx.tenant, day).await;

    assert_eq!(rows[0].expected_receivable_amount, Decimal::from(14_000));
    assert_eq!(rows[0].shipped_pcs, 110);
}

#[tokio::test]
async fn missing_invoice_value_uses_style_price() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);

    fx.shipment(fx.style_b, 30, None, "shipped", "unpaid", at(day, 9)).await;
    fx.refresh(day).await;

    let rows = fx.store.daily_rows(fx.tenant, day).await;
    assert_eq!(rows[0].expected_receivable_amount, Decimal::from(3_000));
}

#[tokio::test]
async fn refresh_is_idempotent() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);

    fx.cutting(fx.style_a, 300, 120, at(day, 7)).await;
    fx.add_job(fx.job(fx.style_b, fx.tailor_1, "completed", 40, 40, 15, at(day, 8), Some(at(day, 18)))).await;
    fx.shipment(fx.style_b, 40, Some(4_000), "shipped", "pending", at(day, 20)).await;

    let first_count = fx.refresh(day).await;
    let first = fx.store.daily_rows(fx.tenant, day).await;
    let second_count = fx.refresh(day).await;
    let second = fx.store.daily_rows(fx.tenant, day).await;

    assert_eq!(first_count, 2);
    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
    assert_eq!(fx.store.daily_row_count().await, 2);
}

#[tokio::test]
async fn concurrent_refreshes_converge() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);
    fx.cutting(fx.style_a, 300, 120, at(day, 7)).await;
    fx.shipment(fx.style_b, 10, Some(1_000), "shipped", "pending", at(day, 9)).await;

    let rollup = &fx.state.rollup_service;
    let (a, b) = tokio::join!(
        rollup.refresh_daily_analytics(Some(fx.tenant), day),
        rollup.refresh_daily_analytics(Some(fx.tenant), day),
    );

    assert_eq!(a.unwrap().count, 2);
    assert_eq!(b.unwrap().count, 2);
    assert_eq!(fx.store.daily_row_count().await, 2);
}

#[tokio::test]
async fn a_day_without_activity_writes_nothing() {
    let fx = Fixture::new().await;

    let outcome = fx
        .state
        .rollup_service
        .refresh_daily_analytics(Some(fx.tenant), d(2024, 3, 15))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.count, 0);
    assert_eq!(fx.store.daily_row_count().await, 0);
}

#[tokio::test]
async fn missing_tenant_is_a_successful_no_op() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);
    fx.cutting(fx.style_a, 300, 120, at(day, 7)).await;

    let outcome = fx.state.rollup_service.refresh_daily_analytics(None, day).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.count, 0);
    assert_eq!(fx.store.daily_row_count().await, 0);
}

#[tokio::test]
async fn style_with_only_shipments_gets_a_complete_row() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);
    fx.shipment(fx.style_b, 12, Some(1_200), "shipped", "paid", at(day, 9)).await;

    fx.refresh(day).await;
    let rows = fx.store.daily_rows(fx.tenant, day).await;

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.style_id, fx.style_b);
    assert_eq!(row.vendor_id, Some(fx.vendor_b));
    assert_eq!(row.shipped_pcs, 12);
    assert_eq!(row.cutting_received_pcs, 0);
    assert_eq!(row.completed_pcs, 0);
    assert!(row.tailor_lines.is_empty());
}

#[tokio::test]
async fn events_outside_the_business_day_are_ignored() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);
    fx.cutting(fx.style_a, 10, 4, at(d(2024, 3, 14), 23)).await;
    fx.cutting(fx.style_a, 20, 8, at(day, 0)).await;
    fx.cutting(fx.style_a, 40, 16, at(d(2024, 3, 16), 0)).await;

    fx.refresh(day).await;
    let rows = fx.store.daily_rows(fx.tenant, day).await;
    assert_eq!(rows[0].cutting_received_pcs, 20);
}

#[tokio::test]
async fn rerun_drops_styles_that_lost_their_activity() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);

    let job = fx.job(fx.style_b, fx.tailor_1, "in-progress", 60, 0, 10, at(day, 9), None);
    fx.add_job(job.clone()).await;
    fx.cutting(fx.style_a, 100, 40, at(day, 8)).await;
    assert_eq!(fx.refresh(day).await, 2);

    // The job was re-dated to the next day.
    let mut moved = job;
    moved.issue_date = at(d(2024, 3, 16), 9);
    fx.store.update_job(moved).await;

    assert_eq!(fx.refresh(day).await, 1);
    let rows = fx.store.daily_rows(fx.tenant, day).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].style_id, fx.style_a);
}

#[tokio::test]
async fn source_failures_propagate() {
    let fx = Fixture::new().await;
    fx.store.set_fail_reads(true).await;

    let result = fx
        .state
        .rollup_service
        .refresh_daily_analytics(Some(fx.tenant), d(2024, 3, 15))
        .await;

    assert!(matches!(result, Err(AppError::InternalServerError(_))));
}

#[tokio::test]
async fn tenants_are_isolated() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 15);
    fx.cutting(fx.style_a, 100, 40, at(day, 8)).await;

    let other_tenant = Uuid::new_v4();
    let outcome = fx
        .state
        .rollup_service
        .refresh_daily_analytics(Some(other_tenant), day)
        .await
        .unwrap();

    assert_eq!(outcome.count, 0);
    assert!(fx.store.daily_rows(other_tenant, day).await.is_empty());
}
