// src/handlers/cron.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Duration;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::{dates::parse_date, error::AppError},
    config::AppState,
    middleware::auth::CronSecret,
    scheduler::{run_daily_cycle, CycleReport},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CronQuery {
    /// Business day to process, `yyyy-MM-dd`. Defaults to yesterday.
    pub date: Option<String>,
}

// POST /api/cron/analytics
#[utoipa::path(
    post,
    path = "/api/cron/analytics",
    tag = "Scheduler",
    params(CronQuery),
    responses(
        (status = 200, description = "Rollup and period closing ran for every tenant", body = CycleReport),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Missing or wrong scheduler secret")
    ),
    security(("cron_secret" = []))
)]
pub async fn run_analytics(
    State(app_state): State<AppState>,
    _secret: CronSecret,
    Query(params): Query<CronQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date = match params.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => parse_date(raw)?,
        None => app_state.clock().today() - Duration::days(1),
    };

    let report = run_daily_cycle(&app_state, date).await?;

    Ok((StatusCode::OK, Json(report)))
}
