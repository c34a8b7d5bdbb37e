//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `ResearchStore` port. All state lives
//! behind one lock, so a debit's check and write never interleave with
//! another request, and report creation debits and inserts as one step.

use async_trait::async_trait;
use chrono::Utc;
use research_assistant_core::domain::{
    ledger_key, NewFile, NewReport, Report, UploadedFile, UsageDelta, UsageRecord,
};
use research_assistant_core::ports::{PortError, PortResult, ResearchStore, UsageLedger};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
struct MemState {
    reports: HashMap<Uuid, Report>,
    files: HashMap<Uuid, UploadedFile>,
    usage: HashMap<String, UsageRecord>,
}

impl MemState {
    fn usage_entry(&mut self, user_id: Option<&str>) -> &mut UsageRecord {
        let key = ledger_key(user_id);
        self.usage
            .entry(key.to_string())
            .or_insert_with(|| UsageRecord::new(key, Utc::now()))
    }

    fn debit(&mut self, user_id: Option<&str>, delta: &UsageDelta) -> PortResult<UsageRecord> {
        let record = self.usage_entry(user_id);
        let updated = record.apply(delta, Utc::now())?;
        *record = updated.clone();
        Ok(updated)
    }
}

/// Volatile store. Dropping it discards every report, file and counter.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageLedger for MemoryStore {
    async fn get_or_create_usage(&self, user_id: Option<&str>) -> PortResult<UsageRecord> {
        let key = ledger_key(user_id);
        if let Some(record) = self.state.read().await.usage.get(key) {
            return Ok(record.clone());
        }
        Ok(self.state.write().await.usage_entry(user_id).clone())
    }

    async fn debit_usage(
        &self,
        user_id: Option<&str>,
        delta: UsageDelta,
    ) -> PortResult<UsageRecord> {
        self.state.write().await.debit(user_id, &delta)
    }
}

#[async_trait]
impl ResearchStore for MemoryStore {
    async fn create_report(&self, report: NewReport) -> PortResult<Report> {
        let mut state = self.state.write().await;

        let delta = UsageDelta::for_report(report.credits_used);
        if let Err(e) = state.debit(report.user_id.as_deref(), &delta) {
            warn!("Report creation refused by the usage ledger: {}", e);
            return Err(e);
        }

        let report = report.into_report(Uuid::new_v4(), Utc::now());
        state.reports.insert(report.id, report.clone());
        debug!("Stored report {}", report.id);
        Ok(report)
    }

    async fn get_report(&self, report_id: Uuid) -> PortResult<Report> {
        self.state
            .read()
            .await
            .reports
            .get(&report_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Report {} not found", report_id)))
    }

    async fn list_recent_reports(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> PortResult<Vec<Report>> {
        let state = self.state.read().await;
        let mut reports: Vec<Report> = state
            .reports
            .values()
            .filter(|report| user_id.map_or(true, |id| report.user_id.as_deref() == Some(id)))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        reports.truncate(limit);
        Ok(reports)
    }

    async fn upload_file(&self, file: NewFile) -> PortResult<UploadedFile> {
        let file = file.into_file(Uuid::new_v4(), Utc::now());
        self.state
            .write()
            .await
            .files
            .insert(file.id, file.clone());
        debug!("Stored file {} ({} bytes)", file.id, file.size);
        Ok(file)
    }

    async fn get_file(&self, file_id: Uuid) -> PortResult<UploadedFile> {
        self.state
            .read()
            .await
            .files
            .get(&file_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("File {} not found", file_id)))
    }

    async fn list_user_files(&self, user_id: Option<&str>) -> PortResult<Vec<UploadedFile>> {
        Ok(self
            .state
            .read()
            .await
            .files
            .values()
            .filter(|file| user_id.map_or(true, |id| file.user_id.as_deref() == Some(id)))
            .cloned()
            .collect())
    }
}
