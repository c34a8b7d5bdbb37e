//! crates/research_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// Ledger key used when a request carries no user id.
pub const DEFAULT_USER_ID: &str = "default";

/// Credit ceiling given to every freshly created usage record.
pub const DEFAULT_CREDITS_AVAILABLE: u32 = 100;

/// Resolves the ledger key for an optional user id. Absent and empty ids
/// both fall back to the shared default user.
pub fn ledger_key(user_id: Option<&str>) -> &str {
    user_id.filter(|id| !id.is_empty()).unwrap_or(DEFAULT_USER_ID)
}

//=========================================================================================
// Usage Ledger
//=========================================================================================

/// Per-user quota counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: String,
    pub total_questions: u32,
    pub total_reports: u32,
    pub total_credits_used: u32,
    pub total_credits_available: u32,
    pub last_updated: DateTime<Utc>,
}

/// Increments applied to a `UsageRecord` by a debit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub questions: u32,
    pub reports: u32,
    pub credits_used: u32,
    /// Replaces the credit ceiling when present.
    pub credits_available: Option<u32>,
}

impl UsageDelta {
    /// The debit charged for one generated report.
    pub fn for_report(credits_used: u32) -> Self {
        Self {
            questions: 1,
            reports: 1,
            credits_used,
            credits_available: None,
        }
    }
}

impl UsageRecord {
    /// A zeroed record with the default credit ceiling.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            total_questions: 0,
            total_reports: 0,
            total_credits_used: 0,
            total_credits_available: DEFAULT_CREDITS_AVAILABLE,
            last_updated: now,
        }
    }

    /// Credits still available before the ceiling is hit.
    pub fn remaining_credits(&self) -> u32 {
        self.total_credits_available
            .saturating_sub(self.total_credits_used)
    }

    /// Computes the record that results from applying `delta`.
    ///
    /// The credit check runs against the ceiling in force before the debit,
    /// so an override in the same delta cannot unlock the credits it pays for.
    /// An override below the resulting usage is rejected as invalid. On
    /// failure `self` is untouched; a quota failure carries the requested
    /// amount together with the remaining balance.
    pub fn apply(&self, delta: &UsageDelta, now: DateTime<Utc>) -> PortResult<Self> {
        let credits_used = self
            .total_credits_used
            .checked_add(delta.credits_used)
            .filter(|used| *used <= self.total_credits_available)
            .ok_or(PortError::InsufficientCredits {
                needed: delta.credits_used,
                remaining: self.remaining_credits(),
            })?;

        let credits_available = delta
            .credits_available
            .unwrap_or(self.total_credits_available);
        if credits_available < credits_used {
            return Err(PortError::Invalid(format!(
                "credit ceiling {} is below the {} credits already used",
                credits_available, credits_used
            )));
        }

        Ok(Self {
            user_id: self.user_id.clone(),
            total_questions: self.total_questions.saturating_add(delta.questions),
            total_reports: self.total_reports.saturating_add(delta.reports),
            total_credits_used: credits_used,
            total_credits_available: credits_available,
            last_updated: now,
        })
    }
}

//=========================================================================================
// Reports and Citations
//=========================================================================================

/// Where a citation points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    Document,
    Web,
    LiveData,
}

impl CitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationKind::Document => "document",
            CitationKind::Web => "web",
            CitationKind::LiveData => "live-data",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "document" => Some(CitationKind::Document),
            "web" => Some(CitationKind::Web),
            "live-data" => Some(CitationKind::LiveData),
            _ => None,
        }
    }
}

/// A source attached to exactly one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub kind: CitationKind,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A generated research report. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: Uuid,
    pub question: String,
    pub key_takeaways: Vec<String>,
    pub insights: String,
    pub full_report: String,
    pub citations: Vec<Citation>,
    pub credits_used: u32,
    pub user_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Input to `ResearchStore::create_report`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewReport {
    pub question: String,
    pub key_takeaways: Option<Vec<String>>,
    pub insights: String,
    pub full_report: String,
    pub citations: Option<Vec<Citation>>,
    pub credits_used: u32,
    pub user_id: Option<String>,
}

impl NewReport {
    /// Materializes the stored report: missing sequences become empty and
    /// both timestamps are set to `now`.
    pub fn into_report(self, id: Uuid, now: DateTime<Utc>) -> Report {
        Report {
            id,
            question: self.question,
            key_takeaways: self.key_takeaways.unwrap_or_default(),
            insights: self.insights,
            full_report: self.full_report,
            citations: self.citations.unwrap_or_default(),
            credits_used: self.credits_used,
            user_id: self.user_id.filter(|id| !id.is_empty()),
            generated_at: now,
            last_updated: now,
        }
    }
}

//=========================================================================================
// Uploaded Files
//=========================================================================================

/// Metadata (and extracted text, when available) of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub content: Option<String>,
    pub user_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Input to `ResearchStore::upload_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub content: Option<String>,
    pub user_id: Option<String>,
}

impl NewFile {
    /// Empty content and an empty user id are stored as absent.
    pub fn into_file(self, id: Uuid, now: DateTime<Utc>) -> UploadedFile {
        UploadedFile {
            id,
            name: self.name,
            size: self.size,
            content_type: self.content_type,
            content: self.content.filter(|content| !content.is_empty()),
            user_id: self.user_id.filter(|id| !id.is_empty()),
            uploaded_at: now,
        }
    }
}

//=========================================================================================
// Text Generation and Dashboard
//=========================================================================================

/// The raw output of the text-generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessStatus {
    Fresh,
    Updating,
    Stale,
}

impl FreshnessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessStatus::Fresh => "fresh",
            FreshnessStatus::Updating => "updating",
            FreshnessStatus::Stale => "stale",
        }
    }
}

/// One row of the dashboard's data-freshness panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFreshness {
    pub source: String,
    pub last_update: DateTime<Utc>,
    pub status: FreshnessStatus,
}
