//! services/api/src/web/routes.rs
//!
//! Assembles the HTTP router shared by the server binary and the tests.

use crate::web::{
    research::generate_report_handler,
    rest::{
        dashboard_stats_handler, get_report_handler, health_handler, list_reports_handler,
        usage_handler, ApiDoc,
    },
    state::AppState,
    upload::{upload_files_handler, MAX_FILES_PER_UPLOAD},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::{ACCEPT, CONTENT_TYPE}, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and the `userId` field.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Builds the complete application: API routes, CORS, request tracing and
/// the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state
        .config
        .max_upload_bytes
        .saturating_mul(MAX_FILES_PER_UPLOAD)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/usage", get(usage_handler))
        .route("/api/reports", get(list_reports_handler))
        .route("/api/reports/{id}", get(get_report_handler))
        .route("/api/files/upload", post(upload_files_handler))
        .route("/api/research/generate", post(generate_report_handler))
        .route("/api/dashboard/stats", get(dashboard_stats_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
