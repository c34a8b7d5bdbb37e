//! services/api/src/adapters/report_llm.rs
//!
//! This module contains the adapter for the report-writing LLM.
//! It implements the `ReportGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use research_assistant_core::{
    domain::Completion,
    ports::{PortError, PortResult, ReportGenerationService},
};
use tracing::{info, warn};

const SYSTEM_INSTRUCTIONS: &str = r#"You are a research assistant that generates comprehensive, evidence-based reports.
Analyze the provided documents and research question to create a structured report with:
1. Key takeaways (3-5 bullet points)
2. Detailed insights paragraph
3. Full comprehensive report
4. Suggest relevant citations

Be thorough, factual, and cite sources appropriately."#;

/// Returned as the report text when the model answers with no content.
const EMPTY_COMPLETION_TEXT: &str = "Unable to generate report";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 3000;

/// Renders the user turn: the question, then the document excerpts if any.
pub fn build_user_prompt(question: &str, context: &str) -> String {
    let documents = if context.is_empty() {
        String::new()
    } else {
        format!("Available Documents:\n{}\n\n", context)
    };
    format!(
        "Research Question: {}\n\n{}Please generate a comprehensive research report addressing this question.",
        question, documents
    )
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ReportGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiReportAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReportAdapter {
    /// Creates a new `OpenAiReportAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `ReportGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReportGenerationService for OpenAiReportAdapter {
    async fn generate_report(&self, question: &str, context: &str) -> PortResult<Completion> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_user_prompt(question, context))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Provider failures are reported uniformly; no retry is attempted.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        let total_tokens = response.usage.as_ref().map(|usage| usage.total_tokens);
        info!("Report completion used {:?} tokens", total_tokens);

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_else(|| {
                warn!("Report completion contained no text content");
                EMPTY_COMPLETION_TEXT.to_string()
            });

        Ok(Completion { text, total_tokens })
    }
}
