// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::scheduler;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Analytics ---
        handlers::analytics::get_kpis,
        handlers::analytics::get_kpi_cards,
        handlers::analytics::get_trend,
        handlers::analytics::get_breakdown,
        handlers::analytics::get_table,
        handlers::analytics::get_overview,

        // --- Scheduler ---
        handlers::cron::run_analytics,
    ),
    components(
        schemas(
            // --- Analytics ---
            crate::common::dates::DateRange,
            models::analytics::Metric,
            models::analytics::GroupBy,
            models::analytics::Granularity,
            models::analytics::PiecesKpi,
            models::analytics::InProductionKpi,
            models::analytics::ShippedKpi,
            models::analytics::AmountKpi,
            models::analytics::KpiSet,
            models::analytics::TrendDirection,
            models::analytics::KpiCard,
            models::analytics::TrendPoint,
            models::analytics::BreakdownEntry,
            models::analytics::TableRow,
            models::analytics::TablePage,
            models::analytics::AnalyticsOverview,

            // --- Finance ---
            models::finance::PeriodType,
            models::finance::PeriodWriteStatus,
            models::finance::PeriodRunSummary,

            // --- Scheduler ---
            scheduler::CycleReport,
            scheduler::TenantCycleReport,
            services::ledger::LedgerDrift,
        )
    ),
    tags(
        (name = "Analytics", description = "Role-scoped KPIs, trends, breakdowns and tables"),
        (name = "Scheduler", description = "Daily rollup and period closing trigger")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        components.add_security_scheme(
            "cron_secret",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
