//! services/api/src/web/research.rs
//!
//! Handles one report-generation request: pick context documents, ask the
//! provider for a completion, and persist the assembled report (which debits
//! the caller's credits).

use crate::error::{ApiError, ApiResult};
use crate::web::payloads::{normalize_user_id, GenerateReportRequest, ReportResponse};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use chrono::Utc;
use research_assistant_core::{
    domain::Report,
    research::{assemble_report, build_document_context, select_context_files},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Runs the generation pipeline for an already validated request.
pub async fn generate_research_report(
    app_state: &AppState,
    question: &str,
    user_id: Option<&str>,
    file_ids: Option<&[Uuid]>,
) -> ApiResult<Report> {
    let generator = app_state
        .report_adapter
        .as_ref()
        .ok_or(ApiError::ProviderNotConfigured)?;

    let files = app_state.store.list_user_files(user_id).await?;
    let files = select_context_files(files, file_ids);
    let context = build_document_context(&files);
    info!("Generating report with {} context document(s)", files.len());

    let llm_start = Instant::now();
    let completion = generator.generate_report(question, &context).await?;
    info!("⏱️ Report completion took: {:?}", llm_start.elapsed());

    let new_report = assemble_report(question, user_id, &completion, &files, Utc::now());
    let report = app_state.store.create_report(new_report).await?;
    info!(
        "Report {} saved, {} credit(s) charged",
        report.id, report.credits_used
    );
    Ok(report)
}

/// Generate a research report for a question.
#[utoipa::path(
    post,
    path = "/api/research/generate",
    request_body = GenerateReportRequest,
    responses(
        (status = 200, description = "Report generated and saved", body = ReportResponse),
        (status = 400, description = "Invalid request data"),
        (status = 402, description = "Insufficient credits"),
        (status = 502, description = "Text generation provider failed"),
        (status = 503, description = "No provider configured")
    )
)]
pub async fn generate_report_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> ApiResult<Json<ReportResponse>> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::Validation(vec![rejection.body_text()]))?;
    request.validate()?;

    let user_id = normalize_user_id(request.user_id);
    let report = generate_research_report(
        &app_state,
        &request.question,
        user_id.as_deref(),
        request.file_ids.as_deref(),
    )
    .await?;

    Ok(Json(report.into()))
}
