//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use research_assistant_core::ports::{ReportGenerationService, ResearchStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResearchStore>,
    pub config: Arc<Config>,
    /// `None` when no provider credential is configured; generation requests
    /// then fail with 503 while every other route keeps working.
    pub report_adapter: Option<Arc<dyn ReportGenerationService>>,
}
