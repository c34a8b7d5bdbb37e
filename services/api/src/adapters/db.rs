//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, a durable implementation of the
//! `ResearchStore` port backed by PostgreSQL through `sqlx`. Ledger debits run
//! inside a transaction that holds the user's usage row locked, and report
//! creation shares that transaction so a refused debit leaves no report behind.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use research_assistant_core::domain::{
    ledger_key, Citation, CitationKind, NewFile, NewReport, Report, UploadedFile, UsageDelta,
    UsageRecord,
};
use research_assistant_core::ports::{PortError, PortResult, ResearchStore, UsageLedger};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

const REPORT_COLUMNS: &str = "id, question, key_takeaways, insights, full_report, citations, \
     credits_used, user_id, generated_at, last_updated";
const FILE_COLUMNS: &str = "id, name, size, content_type, content, user_id, uploaded_at";
const USAGE_COLUMNS: &str = "user_id, total_questions, total_reports, total_credits_used, \
     total_credits_available, last_updated";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ResearchStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Ensures the user's row exists and locks it for the rest of `tx`.
    async fn lock_usage(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &str,
    ) -> PortResult<UsageRecord> {
        sqlx::query("INSERT INTO usage_stats (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .map_err(unexpected)?;

        let record: UsageRow = sqlx::query_as(&format!(
            "SELECT {USAGE_COLUMNS} FROM usage_stats WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    /// Applies `delta` to the locked row, writing nothing if the ledger refuses.
    async fn debit_in(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Option<&str>,
        delta: &UsageDelta,
    ) -> PortResult<UsageRecord> {
        let current = Self::lock_usage(tx, ledger_key(user_id)).await?;
        let updated = current.apply(delta, db_now())?;

        sqlx::query(
            "UPDATE usage_stats SET total_questions = $2, total_reports = $3, \
             total_credits_used = $4, total_credits_available = $5, last_updated = $6 \
             WHERE user_id = $1",
        )
        .bind(&updated.user_id)
        .bind(to_db_int(updated.total_questions)?)
        .bind(to_db_int(updated.total_reports)?)
        .bind(to_db_int(updated.total_credits_used)?)
        .bind(to_db_int(updated.total_credits_available)?)
        .bind(updated.last_updated)
        .execute(&mut **tx)
        .await
        .map_err(unexpected)?;

        Ok(updated)
    }
}

/// The current time at the precision `TIMESTAMPTZ` keeps, so values returned
/// from a write compare equal to the same row read back later.
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: &str, id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError + '_ {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        other => unexpected(other),
    }
}

fn to_db_int(value: u32) -> PortResult<i32> {
    i32::try_from(value)
        .map_err(|_| PortError::Invalid(format!("{} does not fit a database integer", value)))
}

fn from_db_int(column: &str, value: i32) -> PortResult<u32> {
    u32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("column {} holds negative value {}", column, value)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UsageRow {
    user_id: String,
    total_questions: i32,
    total_reports: i32,
    total_credits_used: i32,
    total_credits_available: i32,
    last_updated: DateTime<Utc>,
}
impl UsageRow {
    fn to_domain(self) -> PortResult<UsageRecord> {
        Ok(UsageRecord {
            user_id: self.user_id,
            total_questions: from_db_int("total_questions", self.total_questions)?,
            total_reports: from_db_int("total_reports", self.total_reports)?,
            total_credits_used: from_db_int("total_credits_used", self.total_credits_used)?,
            total_credits_available: from_db_int(
                "total_credits_available",
                self.total_credits_available,
            )?,
            last_updated: self.last_updated,
        })
    }
}

/// JSON shape of one element of `reports.citations`.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct CitationJson {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}
impl CitationJson {
    fn from_domain(citation: &Citation) -> Self {
        Self {
            id: citation.id.clone(),
            title: citation.title.clone(),
            url: citation.url.clone(),
            kind: citation.kind.as_str().to_string(),
            last_updated: citation.last_updated,
        }
    }

    fn to_domain(self) -> PortResult<Citation> {
        let kind = CitationKind::parse(&self.kind).ok_or_else(|| {
            PortError::Unexpected(format!("unknown citation type '{}'", self.kind))
        })?;
        Ok(Citation {
            id: self.id,
            title: self.title,
            url: self.url,
            kind,
            last_updated: self.last_updated,
        })
    }
}

#[derive(FromRow)]
struct ReportRow {
    id: Uuid,
    question: String,
    key_takeaways: Json<Vec<String>>,
    insights: String,
    full_report: String,
    citations: Json<Vec<CitationJson>>,
    credits_used: i32,
    user_id: Option<String>,
    generated_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}
impl ReportRow {
    fn to_domain(self) -> PortResult<Report> {
        Ok(Report {
            id: self.id,
            question: self.question,
            key_takeaways: self.key_takeaways.0,
            insights: self.insights,
            full_report: self.full_report,
            citations: self
                .citations
                .0
                .into_iter()
                .map(CitationJson::to_domain)
                .collect::<PortResult<_>>()?,
            credits_used: from_db_int("credits_used", self.credits_used)?,
            user_id: self.user_id,
            generated_at: self.generated_at,
            last_updated: self.last_updated,
        })
    }
}

#[derive(FromRow)]
struct FileRow {
    id: Uuid,
    name: String,
    size: i64,
    content_type: String,
    content: Option<String>,
    user_id: Option<String>,
    uploaded_at: DateTime<Utc>,
}
impl FileRow {
    fn to_domain(self) -> PortResult<UploadedFile> {
        Ok(UploadedFile {
            id: self.id,
            name: self.name,
            size: u64::try_from(self.size).map_err(|_| {
                PortError::Unexpected(format!("column size holds negative value {}", self.size))
            })?,
            content_type: self.content_type,
            content: self.content,
            user_id: self.user_id,
            uploaded_at: self.uploaded_at,
        })
    }
}

//=========================================================================================
// Port Trait Implementations
//=========================================================================================

#[async_trait]
impl UsageLedger for DbAdapter {
    async fn get_or_create_usage(&self, user_id: Option<&str>) -> PortResult<UsageRecord> {
        let key = ledger_key(user_id);
        sqlx::query("INSERT INTO usage_stats (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record: UsageRow = sqlx::query_as(&format!(
            "SELECT {USAGE_COLUMNS} FROM usage_stats WHERE user_id = $1"
        ))
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        record.to_domain()
    }

    async fn debit_usage(
        &self,
        user_id: Option<&str>,
        delta: UsageDelta,
    ) -> PortResult<UsageRecord> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        // An early return drops `tx`, which rolls the transaction back.
        let updated = Self::debit_in(&mut tx, user_id, &delta).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(updated)
    }
}

#[async_trait]
impl ResearchStore for DbAdapter {
    async fn create_report(&self, report: NewReport) -> PortResult<Report> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let delta = UsageDelta::for_report(report.credits_used);
        if let Err(e) = Self::debit_in(&mut tx, report.user_id.as_deref(), &delta).await {
            warn!("Report creation refused by the usage ledger: {}", e);
            return Err(e);
        }

        let report = report.into_report(Uuid::new_v4(), db_now());
        let citations: Vec<CitationJson> =
            report.citations.iter().map(CitationJson::from_domain).collect();

        sqlx::query(&format!(
            "INSERT INTO reports ({REPORT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(report.id)
        .bind(&report.question)
        .bind(Json(&report.key_takeaways))
        .bind(&report.insights)
        .bind(&report.full_report)
        .bind(Json(&citations))
        .bind(to_db_int(report.credits_used)?)
        .bind(&report.user_id)
        .bind(report.generated_at)
        .bind(report.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        debug!("Stored report {}", report.id);
        Ok(report)
    }

    async fn get_report(&self, report_id: Uuid) -> PortResult<Report> {
        let record: ReportRow =
            sqlx::query_as(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
                .bind(report_id)
                .fetch_one(&self.pool)
                .await
                .map_err(not_found("Report", report_id))?;
        record.to_domain()
    }

    async fn list_recent_reports(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> PortResult<Vec<Report>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports \
             WHERE ($1::TEXT IS NULL OR user_id = $1) \
             ORDER BY generated_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(ReportRow::to_domain).collect()
    }

    async fn upload_file(&self, file: NewFile) -> PortResult<UploadedFile> {
        let file = file.into_file(Uuid::new_v4(), db_now());
        let size = i64::try_from(file.size)
            .map_err(|_| PortError::Invalid(format!("file size {} is too large", file.size)))?;

        sqlx::query(&format!(
            "INSERT INTO uploaded_files ({FILE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(file.id)
        .bind(&file.name)
        .bind(size)
        .bind(&file.content_type)
        .bind(&file.content)
        .bind(&file.user_id)
        .bind(file.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(file)
    }

    async fn get_file(&self, file_id: Uuid) -> PortResult<UploadedFile> {
        let record: FileRow =
            sqlx::query_as(&format!("SELECT {FILE_COLUMNS} FROM uploaded_files WHERE id = $1"))
                .bind(file_id)
                .fetch_one(&self.pool)
                .await
                .map_err(not_found("File", file_id))?;
        record.to_domain()
    }

    async fn list_user_files(&self, user_id: Option<&str>) -> PortResult<Vec<UploadedFile>> {
        let records: Vec<FileRow> = sqlx::query_as(&format!(
            "SELECT {FILE_COLUMNS} FROM uploaded_files WHERE ($1::TEXT IS NULL OR user_id = $1)"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(FileRow::to_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_json_uses_the_wire_tags() {
        let citation = Citation {
            id: "live-data-1".to_string(),
            title: "Real-time Research Database".to_string(),
            url: None,
            kind: CitationKind::LiveData,
            last_updated: None,
        };
        let value = serde_json::to_value(CitationJson::from_domain(&citation)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "live-data-1",
                "title": "Real-time Research Database",
                "type": "live-data"
            })
        );

        let back: CitationJson = serde_json::from_value(value).unwrap();
        assert_eq!(back.to_domain().unwrap(), citation);
    }

    #[test]
    fn unknown_citation_type_is_reported() {
        let stored = CitationJson {
            id: "x".to_string(),
            title: "x".to_string(),
            url: None,
            kind: "rumour".to_string(),
            last_updated: None,
        };
        assert!(matches!(stored.to_domain(), Err(PortError::Unexpected(_))));
    }

    #[test]
    fn negative_counters_are_rejected() {
        let row = UsageRow {
            user_id: "alice".to_string(),
            total_questions: 1,
            total_reports: 1,
            total_credits_used: -4,
            total_credits_available: 100,
            last_updated: Utc::now(),
        };
        assert!(row.to_domain().is_err());
        assert!(to_db_int(u32::MAX).is_err());
        assert_eq!(to_db_int(42).unwrap(), 42);
    }

    #[test]
    fn stamped_times_fit_microsecond_columns() {
        for _ in 0..10 {
            assert_eq!(db_now().timestamp_subsec_nanos() % 1_000, 0);
        }
    }
}
