//! services/api/src/web/payloads.rs
//!
//! Request and response bodies of the REST API. The JSON field names are
//! camelCase, matching what the browser client sends and expects.

use chrono::{DateTime, Utc};
use research_assistant_core::domain::{
    Citation, DataFreshness, Report, UploadedFile, UsageRecord,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;

/// Treats an empty `userId` the same as an absent one.
pub fn normalize_user_id(user_id: Option<String>) -> Option<String> {
    user_id.filter(|id| !id.is_empty())
}

//=========================================================================================
// Query Strings and Request Bodies
//=========================================================================================

#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Owner to scope the request to. Omitted means the default user.
    pub user_id: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportsQuery {
    pub user_id: Option<String>,
    /// Maximum number of reports returned. Defaults to 10.
    pub limit: Option<usize>,
}

/// Body of `POST /api/research/generate`.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub question: String,
    pub user_id: Option<String>,
    /// Files to use as context. Omitted means the five most recent uploads.
    pub file_ids: Option<Vec<Uuid>>,
}

impl GenerateReportRequest {
    /// Checks field constraints, collecting one message per offending field.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut details = Vec::new();
        if self.question.trim().is_empty() {
            details.push("question: Question is required".to_string());
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(details))
        }
    }
}

//=========================================================================================
// Response Bodies
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub user_id: String,
    pub total_questions: u32,
    pub total_reports: u32,
    pub total_credits_used: u32,
    pub total_credits_available: u32,
    pub last_updated: DateTime<Utc>,
}

impl From<UsageRecord> for UsageResponse {
    fn from(record: UsageRecord) -> Self {
        Self {
            user_id: record.user_id,
            total_questions: record.total_questions,
            total_reports: record.total_reports,
            total_credits_used: record.total_credits_used,
            total_credits_available: record.total_credits_available,
            last_updated: record.last_updated,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CitationResponse {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// One of `document`, `web`, `live-data`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<Citation> for CitationResponse {
    fn from(citation: Citation) -> Self {
        Self {
            id: citation.id,
            title: citation.title,
            url: citation.url,
            kind: citation.kind.as_str().to_string(),
            last_updated: citation.last_updated,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: Uuid,
    pub question: String,
    pub key_takeaways: Vec<String>,
    pub insights: String,
    pub full_report: String,
    pub citations: Vec<CitationResponse>,
    pub credits_used: u32,
    pub user_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            id: report.id,
            question: report.question,
            key_takeaways: report.key_takeaways,
            insights: report.insights,
            full_report: report.full_report,
            citations: report.citations.into_iter().map(Into::into).collect(),
            credits_used: report.credits_used,
            user_id: report.user_id,
            generated_at: report.generated_at,
            last_updated: report.last_updated,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub content: Option<String>,
    pub user_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<UploadedFile> for FileResponse {
    fn from(file: UploadedFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            size: file.size,
            content_type: file.content_type,
            content: file.content,
            user_id: file.user_id,
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct UploadResponse {
    pub files: Vec<FileResponse>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: Uuid,
    pub question: String,
    pub generated_at: DateTime<Utc>,
    pub credits_used: u32,
}

impl From<Report> for ReportSummary {
    fn from(report: Report) -> Self {
        Self {
            id: report.id,
            question: report.question,
            generated_at: report.generated_at,
            credits_used: report.credits_used,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DataFreshnessResponse {
    pub source: String,
    pub last_update: DateTime<Utc>,
    /// One of `fresh`, `updating`, `stale`.
    pub status: String,
}

impl From<DataFreshness> for DataFreshnessResponse {
    fn from(row: DataFreshness) -> Self {
        Self {
            source: row.source,
            last_update: row.last_update,
            status: row.status.as_str().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatsResponse {
    pub total_questions: u32,
    pub total_reports: u32,
    pub total_credits_used: u32,
    pub total_credits_available: u32,
    pub recent_reports: Vec<ReportSummary>,
    pub data_freshness: Vec<DataFreshnessResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_assistant_core::domain::CitationKind;

    #[test]
    fn blank_question_is_a_validation_error() {
        let request = GenerateReportRequest {
            question: "   ".to_string(),
            user_id: None,
            file_ids: None,
        };
        match request.validate() {
            Err(ApiError::Validation(details)) => {
                assert_eq!(details, vec!["question: Question is required".to_string()])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn citation_serializes_with_type_tag_and_camel_case() {
        let citation = CitationResponse::from(Citation {
            id: "f-0".to_string(),
            title: "a.txt".to_string(),
            url: None,
            kind: CitationKind::Document,
            last_updated: None,
        });
        let value = serde_json::to_value(citation).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "id": "f-0", "title": "a.txt", "type": "document" })
        );
    }

    #[test]
    fn empty_user_id_is_dropped() {
        assert_eq!(normalize_user_id(Some(String::new())), None);
        assert_eq!(normalize_user_id(Some("a".to_string())), Some("a".to_string()));
    }
}
