//! crates/research_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! Storage backends and the text-generation provider live behind these
//! traits so the web layer never depends on a concrete implementation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Completion, NewFile, NewReport, Report, UploadedFile, UsageDelta, UsageRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The debit was refused. `remaining` is the balance left on the ledger.
    #[error("Insufficient credits. Need {needed} but only {remaining} available.")]
    InsufficientCredits { needed: u32, remaining: u32 },
    #[error("Invalid input: {0}")]
    Invalid(String),
    /// The text-generation provider is missing or failed.
    #[error("Upstream service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Per-user credit accounting. A `None` user id addresses the default user.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Returns the user's record, inserting a zeroed one on first access.
    async fn get_or_create_usage(&self, user_id: Option<&str>) -> PortResult<UsageRecord>;

    /// Applies `delta` atomically with respect to other debits for the same
    /// user. Fails with `InsufficientCredits` and changes nothing when the
    /// debit would exceed the credit ceiling.
    async fn debit_usage(&self, user_id: Option<&str>, delta: UsageDelta)
        -> PortResult<UsageRecord>;
}

#[async_trait]
pub trait ResearchStore: UsageLedger {
    // --- Reports ---

    /// Debits the owner's ledger (+1 question, +1 report, +credits) and then
    /// persists the report. A failed debit aborts creation: nothing is stored.
    async fn create_report(&self, report: NewReport) -> PortResult<Report>;

    async fn get_report(&self, report_id: Uuid) -> PortResult<Report>;

    /// Most recent reports first, optionally restricted to one user.
    async fn list_recent_reports(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> PortResult<Vec<Report>>;

    // --- Uploaded Files ---

    async fn upload_file(&self, file: NewFile) -> PortResult<UploadedFile>;

    async fn get_file(&self, file_id: Uuid) -> PortResult<UploadedFile>;

    /// All files, or only the given user's. Order is unspecified.
    async fn list_user_files(&self, user_id: Option<&str>) -> PortResult<Vec<UploadedFile>>;
}

#[async_trait]
pub trait ReportGenerationService: Send + Sync {
    /// Synthesizes a report for `question`, using `context` (concatenated
    /// document excerpts, possibly empty) as supporting material.
    async fn generate_report(&self, question: &str, context: &str) -> PortResult<Completion>;
}
