//! crates/research_assistant_core/src/research.rs
//!
//! Turns a provider completion into a storable report: context selection,
//! credit pricing, citations and the placeholder sections the product shows
//! before structured output is wired in.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    Citation, CitationKind, Completion, DataFreshness, FreshnessStatus, NewReport, UploadedFile,
};

/// Files used as context when the request names none.
pub const DEFAULT_CONTEXT_FILES: usize = 5;
/// Characters of each document forwarded to the provider.
pub const MAX_EXCERPT_CHARS: usize = 2000;
/// Characters of the completion copied into the insights section.
pub const INSIGHTS_CHARS: usize = 500;
pub const TOKENS_PER_CREDIT: u32 = 100;
/// Charged when the provider does not report token usage.
pub const FALLBACK_TOTAL_TOKENS: u32 = 1000;

/// Picks the files whose content is sent along with the question.
///
/// With explicit ids, every listed file is kept (unknown ids are ignored).
/// Without ids, the most recent uploads are used.
pub fn select_context_files(
    mut files: Vec<UploadedFile>,
    file_ids: Option<&[Uuid]>,
) -> Vec<UploadedFile> {
    match file_ids {
        Some(ids) => {
            files.retain(|file| ids.contains(&file.id));
            files
        }
        None => {
            files.sort_by_key(|file| file.uploaded_at);
            let skip = files.len().saturating_sub(DEFAULT_CONTEXT_FILES);
            files.split_off(skip)
        }
    }
}

/// Renders the document excerpts block of the user prompt.
pub fn build_document_context(files: &[UploadedFile]) -> String {
    files
        .iter()
        .map(|file| {
            let excerpt: String = file
                .content
                .as_deref()
                .unwrap_or_default()
                .chars()
                .take(MAX_EXCERPT_CHARS)
                .collect();
            format!("Document: {}\nContent: {}...", file.name, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One credit per started block of 100 tokens.
pub fn credits_for_tokens(total_tokens: Option<u32>) -> u32 {
    total_tokens
        .unwrap_or(FALLBACK_TOTAL_TOKENS)
        .div_ceil(TOKENS_PER_CREDIT)
}

/// Placeholder takeaways. These are fixed strings, not derived from the
/// completion.
pub fn placeholder_key_takeaways() -> Vec<String> {
    [
        "AI-powered analysis of provided documents and research question",
        "Cross-referenced findings from uploaded materials",
        "Evidence-based insights with source attribution",
        "Comprehensive research synthesis and recommendations",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

pub fn insights_excerpt(text: &str) -> String {
    let head: String = text.chars().take(INSIGHTS_CHARS).collect();
    format!("{head}...")
}

/// One document citation per context file, then the live-data entry.
pub fn build_citations(files: &[UploadedFile], now: DateTime<Utc>) -> Vec<Citation> {
    let mut citations: Vec<Citation> = files
        .iter()
        .enumerate()
        .map(|(index, file)| Citation {
            id: format!("{}-{}", file.id, index),
            title: file.name.clone(),
            url: None,
            kind: CitationKind::Document,
            last_updated: Some(file.uploaded_at),
        })
        .collect();

    // Placeholder until a live data source exists.
    citations.push(Citation {
        id: "live-data-1".to_string(),
        title: "Real-time Research Database".to_string(),
        url: None,
        kind: CitationKind::LiveData,
        last_updated: Some(now),
    });

    citations
}

/// Builds the creation input for a report generated from `completion`.
pub fn assemble_report(
    question: &str,
    user_id: Option<&str>,
    completion: &Completion,
    files: &[UploadedFile],
    now: DateTime<Utc>,
) -> NewReport {
    NewReport {
        question: question.to_string(),
        key_takeaways: Some(placeholder_key_takeaways()),
        insights: insights_excerpt(&completion.text),
        full_report: completion.text.clone(),
        citations: Some(build_citations(files, now)),
        credits_used: credits_for_tokens(completion.total_tokens),
        user_id: user_id.map(str::to_string),
    }
}

/// Placeholder freshness panel for the dashboard. No source is actually
/// polled.
pub fn placeholder_data_freshness(now: DateTime<Utc>) -> Vec<DataFreshness> {
    vec![
        DataFreshness {
            source: "Academic Papers Database".to_string(),
            last_update: now - Duration::minutes(30),
            status: FreshnessStatus::Fresh,
        },
        DataFreshness {
            source: "News Aggregator API".to_string(),
            last_update: now - Duration::minutes(5),
            status: FreshnessStatus::Updating,
        },
        DataFreshness {
            source: "Market Data Feed".to_string(),
            last_update: now - Duration::hours(2),
            status: FreshnessStatus::Stale,
        },
    ]
}
