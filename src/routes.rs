// src/routes.rs

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

/// The full application router, state applied.
pub fn build_router(app_state: AppState) -> Router {
    // Role-scoped reads (JWT)
    let analytics_routes = Router::new()
        .route("/kpis", get(handlers::analytics::get_kpis))
        .route("/kpi-cards", get(handlers::analytics::get_kpi_cards))
        .route("/trend", get(handlers::analytics::get_trend))
        .route("/breakdown", get(handlers::analytics::get_breakdown))
        .route("/table", get(handlers::analytics::get_table))
        .route("/overview", get(handlers::analytics::get_overview));

    // Scheduler trigger (shared secret)
    let cron_routes = Router::new().route("/analytics", post(handlers::cron::run_analytics));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/analytics", analytics_routes)
        .nest("/api/cron", cron_routes)
        .with_state(app_state)
}
