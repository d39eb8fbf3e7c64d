mod common;

use rust_decimal::Decimal;

use common::{at, d, Fixture, CRON_SECRET, JWT_SECRET};
use manufacturing_analytics::{
    config::AppConfig,
    db::FinancialPeriodStore,
    models::{
        finance::{PeriodType, PeriodWriteStatus},
        raw_events::PaymentEntryType,
    },
    scheduler::run_daily_cycle,
    services::CostRates,
};

fn dec(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

async fn with_rates() -> Fixture {
    let mut config = AppConfig::new(JWT_SECRET, CRON_SECRET);
    config.cost_rates = CostRates {
        fabric_cost_per_meter: Decimal::from(50),
        daily_overhead: Decimal::from(100),
        daily_depreciation: Decimal::from(20),
        daily_interest: Decimal::from(10),
        tax_rate_pct: Decimal::from(25),
    };
    Fixture::with_config(config).await
}

/// Wednesday 2024-03-13: revenue 2500, direct costs 1250.
async fn trading_day(fx: &Fixture) {
    let day = d(2024, 3, 13);
    fx.cutting(fx.style_a, 100, 20, at(day, 8)).await;
    fx.shipment(fx.style_a, 10, Some(2_000), "shipped", "pending", at(day, 11)).await;
    fx.shipment(fx.style_b, 5, None, "delivered", "paid", at(day, 12)).await;
    fx.shipment(fx.style_b, 7, Some(700), "packed", "unpaid", at(day, 13)).await;
    fx.add_job(fx.job(fx.style_a, fx.tailor_1, "completed", 10, 10, 25, at(day, 8), Some(at(day, 14)))).await;
    fx.payment(fx.tailor_1, PaymentEntryType::Earning, 300, 300, at(day, 15)).await;
    fx.payment(fx.tailor_1, PaymentEntryType::Deduction, 50, 250, at(day, 16)).await;
    fx.payment(fx.tailor_1, PaymentEntryType::Payout, 200, 50, at(day, 17)).await;
}

#[tokio::test]
async fn only_periods_ending_on_the_date_are_closed() {
    let fx = Fixture::new().await;
    let finance = &fx.state.finance_service;

    let quarter_end = finance.close_periods(fx.tenant, d(2024, 3, 31)).await.unwrap();
    let keys: Vec<&str> = quarter_end.iter().map(|p| p.period_key.as_str()).collect();
    assert_eq!(keys, vec!["2024-03-31", "2024-W13", "2024-03", "2024-Q1"]);

    let year_end = finance.close_periods(fx.tenant, d(2024, 12, 31)).await.unwrap();
    let types: Vec<PeriodType> = year_end.iter().map(|p| p.period_type).collect();
    assert_eq!(
        types,
        vec![PeriodType::Daily, PeriodType::Monthly, PeriodType::Quarterly, PeriodType::Yearly]
    );

    let mid_week = finance.close_periods(fx.tenant, d(2024, 3, 13)).await.unwrap();
    assert_eq!(mid_week.len(), 1);
    assert_eq!(mid_week[0].period_type, PeriodType::Daily);

    assert_eq!(fx.store.period_count().await, 9);
}

#[tokio::test]
async fn period_row_carries_the_full_pl() {
    let fx = with_rates().await;
    trading_day(&fx).await;

    let summaries = fx.state.finance_service.close_periods(fx.tenant, d(2024, 3, 13)).await.unwrap();
    assert_eq!(summaries[0].status, PeriodWriteStatus::Written);

    let row = fx
        .store
        .find_period(fx.tenant, PeriodType::Daily, "2024-03-13")
        .await
        .unwrap()
        .unwrap();

    // Packed goods have not left: no revenue.
    assert_eq!(row.revenue, Decimal::from(2_500));
    assert_eq!(row.costs.fabric_cost, Decimal::from(1_000));
    // Earnings minus deductions; the payout is cash, not cost.
    assert_eq!(row.costs.tailoring_cost, Decimal::from(250));
    assert_eq!(row.costs.direct_costs, Decimal::from(1_250));
    assert_eq!(row.costs.total, Decimal::from(1_380));
    assert_eq!(row.gross_profit, Decimal::from(1_250));
    assert_eq!(row.ebitda, Decimal::from(1_150));
    assert_eq!(row.operating_profit, Decimal::from(1_130));
    assert_eq!(row.taxes, Decimal::from(280));
    assert_eq!(row.net_profit, Decimal::from(840));
    assert_eq!(row.gross_profit_margin, Decimal::from(50));
    assert_eq!(row.operating_margin, dec(452, 1));
    assert_eq!(row.net_profit_margin, dec(336, 1));
    assert!(!row.is_finalized);

    let breakdown = &row.revenue_breakdown;
    assert_eq!(breakdown.by_vendor[&fx.vendor_a.to_string()], Decimal::from(2_000));
    assert_eq!(breakdown.by_style[&fx.style_b.to_string()], Decimal::from(500));
    assert_eq!(breakdown.by_size["M"], Decimal::from(2_500));
    assert_eq!(breakdown.by_fabric_type["cotton"], Decimal::from(2_000));
    assert_eq!(breakdown.by_fabric_type["linen"], Decimal::from(500));
    assert_eq!(breakdown.by_tailor[&fx.tailor_1.to_string()], Decimal::from(2_000));
}

#[tokio::test]
async fn window_calculations_match_the_stored_period() {
    let fx = with_rates().await;
    trading_day(&fx).await;
    let finance = &fx.state.finance_service;
    let window = fx.state.clock().day_window(d(2024, 3, 13));

    let revenue = finance.calculate_revenue(fx.tenant, window).await.unwrap();
    assert_eq!(revenue.total, Decimal::from(2_500));
    assert_eq!(revenue.shipment_count, 2);
    assert_eq!(revenue.pcs_shipped, 15);

    let pl = finance.calculate_pl_statement(fx.tenant, window).await.unwrap();
    assert_eq!(pl.net_profit, Decimal::from(840));

    let turnover = finance.calculate_inventory_turnover(fx.tenant, window).await.unwrap();
    assert_eq!(turnover.opening_stock_pcs, 0);
    // 100 cut, 22 sent out (packed included).
    assert_eq!(turnover.closing_stock_pcs, 78);
    assert_eq!(turnover.pcs_shipped, 15);
    assert!(turnover.turnover > Decimal::ZERO);
}

#[tokio::test]
async fn a_loss_is_not_taxed() {
    let fx = with_rates().await;
    let day = d(2024, 3, 14);
    fx.cutting(fx.style_a, 100, 20, at(day, 8)).await;

    let window = fx.state.clock().day_window(day);
    let pl = fx.state.finance_service.calculate_pl_statement(fx.tenant, window).await.unwrap();

    assert_eq!(pl.revenue, Decimal::ZERO);
    assert_eq!(pl.taxes, Decimal::ZERO);
    assert_eq!(pl.net_profit, Decimal::from(-1_130));
    assert_eq!(pl.net_profit_margin, Decimal::ZERO);
}

#[tokio::test]
async fn finalized_periods_are_never_rewritten() {
    let fx = with_rates().await;
    trading_day(&fx).await;
    let finance = &fx.state.finance_service;
    let day = d(2024, 3, 13);

    finance.close_periods(fx.tenant, day).await.unwrap();
    assert!(finance.finalize_period(fx.tenant, PeriodType::Daily, "2024-03-13").await.unwrap());

    // A late shipment arrives for the same day.
    fx.shipment(fx.style_a, 50, Some(10_000), "shipped", "pending", at(day, 20)).await;
    let rerun = finance.close_periods(fx.tenant, day).await.unwrap();
    assert_eq!(rerun[0].status, PeriodWriteStatus::SkippedFinalized);

    let stored = fx
        .store
        .find_period(fx.tenant, PeriodType::Daily, "2024-03-13")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_finalized);
    assert_eq!(stored.revenue, Decimal::from(2_500));

    assert!(!finance.finalize_period(fx.tenant, PeriodType::Weekly, "2024-W11").await.unwrap());
}

#[tokio::test]
async fn recomputing_an_open_period_overwrites_it() {
    let fx = with_rates().await;
    trading_day(&fx).await;
    let finance = &fx.state.finance_service;
    let day = d(2024, 3, 13);

    finance.close_periods(fx.tenant, day).await.unwrap();
    fx.shipment(fx.style_a, 5, Some(1_000), "shipped", "pending", at(day, 21)).await;
    finance.close_periods(fx.tenant, day).await.unwrap();

    let stored = fx
        .store
        .find_period(fx.tenant, PeriodType::Daily, "2024-03-13")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.revenue, Decimal::from(3_500));
    assert_eq!(fx.store.period_count().await, 1);
}

#[tokio::test]
async fn daily_cycle_reports_ledger_drift() {
    let fx = Fixture::new().await;
    let day = d(2024, 3, 13);
    fx.cutting(fx.style_a, 40, 10, at(day, 8)).await;
    fx.payment(fx.tailor_1, PaymentEntryType::Earning, 300, 300, at(day, 9)).await;
    // Should be 200.
    fx.payment(fx.tailor_1, PaymentEntryType::Payout, 100, 250, at(day, 10)).await;
    fx.payment(fx.tailor_1, PaymentEntryType::Earning, 50, 250, at(day, 11)).await;
    fx.payment(fx.tailor_2, PaymentEntryType::Advance, 80, -80, at(day, 12)).await;

    let report = run_daily_cycle(&fx.state, day).await.unwrap();

    assert_eq!(report.date, day);
    assert_eq!(report.tenants.len(), 1);
    let tenant = &report.tenants[0];
    assert_eq!(tenant.tenant_id, fx.tenant);
    assert_eq!(tenant.rollup_rows, 1);
    assert_eq!(tenant.periods.len(), 1);
    assert_eq!(tenant.ledger_drifts.len(), 1);
    assert_eq!(tenant.ledger_drifts[0].stored_balance, Decimal::from(250));
    assert_eq!(tenant.ledger_drifts[0].expected_balance, Decimal::from(200));
}

#[tokio::test]
async fn daily_cycle_is_safe_to_repeat() {
    let fx = with_rates().await;
    trading_day(&fx).await;
    let day = d(2024, 3, 13);

    let first = run_daily_cycle(&fx.state, day).await.unwrap();
    let second = run_daily_cycle(&fx.state, day).await.unwrap();

    assert_eq!(first.tenants[0].rollup_rows, second.tenants[0].rollup_rows);
    assert_eq!(first.tenants[0].periods[0].net_profit, second.tenants[0].periods[0].net_profit);
    assert_eq!(fx.store.daily_row_count().await, 2);
    assert_eq!(fx.store.period_count().await, 1);
}
