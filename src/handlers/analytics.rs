// src/handlers/analytics.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    common::{dates::DateRange, error::AppError},
    config::AppState,
    middleware::auth::AuthenticatedActor,
    models::{
        actor::ActorContext,
        analytics::{
            AnalyticsOverview, BreakdownEntry, Granularity, GroupBy, KpiCard, KpiSet, Metric,
            QueryFilters, TablePage, TrendPoint,
        },
    },
    services::AnalyticsQueryService,
};

// =========================================================================
//  QUERY PARAMETERS
// =========================================================================

/// Date range and dimension filters shared by every analytics route.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    /// Inclusive start, `yyyy-MM-dd`. Requires `end`.
    pub start: Option<String>,
    /// Inclusive end, `yyyy-MM-dd`. Requires `start`.
    pub end: Option<String>,
    /// today, yesterday, 7d, 30d, 90d, mtd, qtd or ytd. Ignored when start/end are given.
    #[validate(length(min = 1, max = 16, message = "preset is too long"))]
    pub preset: Option<String>,
    /// Comma separated style ids.
    pub style_ids: Option<String>,
    /// Comma separated vendor ids.
    pub vendor_ids: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    #[validate(required(message = "metric is required"))]
    pub metric: Option<String>,
    /// day (default), week or month.
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[validate(length(min = 1, max = 16, message = "preset is too long"))]
    pub preset: Option<String>,
    pub style_ids: Option<String>,
    pub vendor_ids: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BreakdownQuery {
    #[validate(required(message = "metric is required"))]
    pub metric: Option<String>,
    /// style, vendor or tailor.
    #[validate(required(message = "groupBy is required"))]
    pub group_by: Option<String>,
    /// Defaults to 10, capped at 100.
    pub limit: Option<i64>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[validate(length(min = 1, max = 16, message = "preset is too long"))]
    pub preset: Option<String>,
    pub style_ids: Option<String>,
    pub vendor_ids: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TableQuery {
    /// Page size, 1 to 500 (default 50).
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "offset cannot be negative"))]
    pub offset: Option<i64>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[validate(length(min = 1, max = 16, message = "preset is too long"))]
    pub preset: Option<String>,
    pub style_ids: Option<String>,
    pub vendor_ids: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OverviewQuery {
    pub metric: Option<String>,
    pub group_by: Option<String>,
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[validate(length(min = 1, max = 16, message = "preset is too long"))]
    pub preset: Option<String>,
    pub style_ids: Option<String>,
    pub vendor_ids: Option<String>,
}

// =========================================================================
//  HELPERS
// =========================================================================

async fn scoped_service(state: &AppState, actor: ActorContext) -> Result<AnalyticsQueryService, AppError> {
    let mut service = state.query_service_for(actor);
    service.init().await?;
    Ok(service)
}

fn range_and_filters(
    service: &AnalyticsQueryService,
    start: &Option<String>,
    end: &Option<String>,
    preset: &Option<String>,
    style_ids: &Option<String>,
    vendor_ids: &Option<String>,
) -> Result<(DateRange, QueryFilters), AppError> {
    let range = DateRange::resolve(start.as_deref(), end.as_deref(), preset.as_deref(), service.today())?;
    let filters = QueryFilters::parse(style_ids.as_deref(), vendor_ids.as_deref())?;
    Ok((range, filters))
}

fn parse_opt<T>(raw: &Option<String>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<T>)
        .transpose()
}

fn parse_required<T>(raw: &Option<String>, name: &str) -> Result<T, AppError>
where
    T: std::str::FromStr<Err = AppError>,
{
    parse_opt(raw)?.ok_or_else(|| AppError::InvalidInput(format!("'{}' is required.", name)))
}

// =========================================================================
//  ROUTES
// =========================================================================

// GET /api/analytics/kpis
#[utoipa::path(
    get,
    path = "/api/analytics/kpis",
    tag = "Analytics",
    params(RangeQuery),
    responses(
        (status = 200, description = "KPI totals for the range", body = KpiSet),
        (status = 400, description = "Malformed date range or filters"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Filters outside the caller's scope")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_kpis(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let service = scoped_service(&app_state, actor).await?;
    let (range, filters) = range_and_filters(
        &service,
        &params.start,
        &params.end,
        &params.preset,
        &params.style_ids,
        &params.vendor_ids,
    )?;

    let kpis = service.get_dashboard_kpis(range, &filters).await?;

    Ok((StatusCode::OK, Json(kpis)))
}

// GET /api/analytics/kpi-cards
#[utoipa::path(
    get,
    path = "/api/analytics/kpi-cards",
    tag = "Analytics",
    params(RangeQuery),
    responses(
        (status = 200, description = "One card per visible metric, with trend against the previous range", body = Vec<KpiCard>),
        (status = 400, description = "Malformed date range or filters"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_kpi_cards(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<RangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let service = scoped_service(&app_state, actor).await?;
    let (range, filters) = range_and_filters(
        &service,
        &params.start,
        &params.end,
        &params.preset,
        &params.style_ids,
        &params.vendor_ids,
    )?;

    let cards = service.get_kpi_cards(range, &filters).await?;

    Ok((StatusCode::OK, Json(cards)))
}

// GET /api/analytics/trend
#[utoipa::path(
    get,
    path = "/api/analytics/trend",
    tag = "Analytics",
    params(TrendQuery),
    responses(
        (status = 200, description = "One point per bucket, zeros included", body = Vec<TrendPoint>),
        (status = 400, description = "Missing or unknown metric, malformed range"),
        (status = 403, description = "Metric not available to the caller")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_trend(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let metric: Metric = parse_required(&params.metric, "metric")?;
    let granularity: Granularity = parse_opt(&params.granularity)?.unwrap_or_default();

    let service = scoped_service(&app_state, actor).await?;
    let (range, filters) = range_and_filters(
        &service,
        &params.start,
        &params.end,
        &params.preset,
        &params.style_ids,
        &params.vendor_ids,
    )?;

    let points = service.get_trend_data(metric, range, granularity, &filters).await?;

    Ok((StatusCode::OK, Json(points)))
}

// GET /api/analytics/breakdown
#[utoipa::path(
    get,
    path = "/api/analytics/breakdown",
    tag = "Analytics",
    params(BreakdownQuery),
    responses(
        (status = 200, description = "Top groups; percentages are shares of the returned entries", body = Vec<BreakdownEntry>),
        (status = 400, description = "Missing or unknown metric / groupBy"),
        (status = 403, description = "Metric or grouping not available to the caller")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_breakdown(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<BreakdownQuery>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let metric: Metric = parse_required(&params.metric, "metric")?;
    let group_by: GroupBy = parse_required(&params.group_by, "groupBy")?;

    let service = scoped_service(&app_state, actor).await?;
    let (range, filters) = range_and_filters(
        &service,
        &params.start,
        &params.end,
        &params.preset,
        &params.style_ids,
        &params.vendor_ids,
    )?;

    let entries = service
        .get_breakdown(metric, group_by, range, params.limit, &filters)
        .await?;

    Ok((StatusCode::OK, Json(entries)))
}

// GET /api/analytics/table
#[utoipa::path(
    get,
    path = "/api/analytics/table",
    tag = "Analytics",
    params(TableQuery),
    responses(
        (status = 200, description = "Per-day, per-style rows", body = TablePage),
        (status = 400, description = "Malformed range, filters or paging")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_table(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<TableQuery>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;

    let service = scoped_service(&app_state, actor).await?;
    let (range, filters) = range_and_filters(
        &service,
        &params.start,
        &params.end,
        &params.preset,
        &params.style_ids,
        &params.vendor_ids,
    )?;

    let page = service
        .get_table(range, &filters, params.limit, params.offset)
        .await?;

    Ok((StatusCode::OK, Json(page)))
}

// GET /api/analytics/overview
#[utoipa::path(
    get,
    path = "/api/analytics/overview",
    tag = "Analytics",
    params(OverviewQuery),
    responses(
        (status = 200, description = "KPIs, trend and breakdown in one response", body = AnalyticsOverview),
        (status = 400, description = "Unknown metric, grouping or granularity"),
        (status = 403, description = "Metric or grouping not available to the caller")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_overview(
    State(app_state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(params): Query<OverviewQuery>,
) -> Result<impl IntoResponse, AppError> {
    params.validate()?;
    let metric: Option<Metric> = parse_opt(&params.metric)?;
    let group_by: Option<GroupBy> = parse_opt(&params.group_by)?;
    let granularity: Granularity = parse_opt(&params.granularity)?.unwrap_or_default();

    let service = scoped_service(&app_state, actor).await?;
    let (range, filters) = range_and_filters(
        &service,
        &params.start,
        &params.end,
        &params.preset,
        &params.style_ids,
        &params.vendor_ids,
    )?;

    let overview = service
        .get_overview(range, metric, group_by, granularity, &filters)
        .await?;

    Ok((StatusCode::OK, Json(overview)))
}
