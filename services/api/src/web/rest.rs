//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the read-side REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ApiResult};
use crate::web::payloads::{
    normalize_user_id, CitationResponse, DashboardStatsResponse, DataFreshnessResponse,
    FileResponse, GenerateReportRequest, HealthResponse, ReportResponse, ReportSummary,
    ReportsQuery, UploadResponse, UsageResponse, UserQuery,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Json,
};
use chrono::Utc;
use research_assistant_core::{ports::PortError, research::placeholder_data_freshness};
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;

/// Reports returned by `GET /api/reports` when no limit is given.
pub const DEFAULT_REPORT_LIMIT: usize = 10;
/// Reports summarized on the dashboard.
pub const DASHBOARD_REPORT_LIMIT: usize = 5;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        usage_handler,
        list_reports_handler,
        get_report_handler,
        dashboard_stats_handler,
        crate::web::upload::upload_files_handler,
        crate::web::research::generate_report_handler,
    ),
    components(
        schemas(
            HealthResponse,
            UsageResponse,
            ReportResponse,
            CitationResponse,
            FileResponse,
            UploadResponse,
            GenerateReportRequest,
            DashboardStatsResponse,
            ReportSummary,
            DataFreshnessResponse,
        )
    ),
    tags(
        (name = "Research Assistant API", description = "Report generation, uploads and usage tracking.")
    )
)]
pub struct ApiDoc;

/// Maps a malformed query string to a validation error.
fn query_or_invalid<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(inner)| inner)
        .map_err(|rejection| ApiError::Validation(vec![rejection.body_text()]))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

/// Usage counters for one user, created on first access.
#[utoipa::path(
    get,
    path = "/api/usage",
    params(UserQuery),
    responses(
        (status = 200, description = "Current usage", body = UsageResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn usage_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<UsageResponse>> {
    let query = query_or_invalid(query)?;
    let user_id = normalize_user_id(query.user_id);
    let usage = app_state
        .store
        .get_or_create_usage(user_id.as_deref())
        .await?;
    Ok(Json(usage.into()))
}

/// Most recent reports first.
#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportsQuery),
    responses(
        (status = 200, description = "Recent reports", body = [ReportResponse]),
        (status = 400, description = "Malformed query string")
    )
)]
pub async fn list_reports_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<ReportsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ReportResponse>>> {
    let query = query_or_invalid(query)?;
    let user_id = normalize_user_id(query.user_id);
    let limit = query.limit.unwrap_or(DEFAULT_REPORT_LIMIT);

    let reports = app_state
        .store
        .list_recent_reports(user_id.as_deref(), limit)
        .await?;
    Ok(Json(reports.into_iter().map(Into::into).collect()))
}

/// A single report by id.
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(("id" = String, Path, description = "Report id")),
    responses(
        (status = 200, description = "The report", body = ReportResponse),
        (status = 404, description = "Report not found")
    )
)]
pub async fn get_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportResponse>> {
    // An id that is not a UUID cannot name a stored report.
    let report_id = Uuid::parse_str(&id)
        .map_err(|_| PortError::NotFound(format!("Report {} not found", id)))?;
    let report = app_state.store.get_report(report_id).await?;
    Ok(Json(report.into()))
}

/// Usage counters, the latest reports and the data-freshness panel.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    params(UserQuery),
    responses((status = 200, description = "Dashboard statistics", body = DashboardStatsResponse))
)]
pub async fn dashboard_stats_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<DashboardStatsResponse>> {
    let query = query_or_invalid(query)?;
    let user_id = normalize_user_id(query.user_id);

    let (usage, recent) = tokio::join!(
        app_state.store.get_or_create_usage(user_id.as_deref()),
        app_state
            .store
            .list_recent_reports(user_id.as_deref(), DASHBOARD_REPORT_LIMIT),
    );
    let usage = usage?;

    Ok(Json(DashboardStatsResponse {
        total_questions: usage.total_questions,
        total_reports: usage.total_reports,
        total_credits_used: usage.total_credits_used,
        total_credits_available: usage.total_credits_available,
        recent_reports: recent?.into_iter().map(Into::into).collect(),
        data_freshness: placeholder_data_freshness(Utc::now())
            .into_iter()
            .map(Into::into)
            .collect(),
    }))
}
