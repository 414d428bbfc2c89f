//! Post-call summarization.

use serde::{Deserialize, Serialize};

use crate::normalizer::Transcript;
use crate::openai::{ChatMessage, OpenAiClient, UpstreamError};

/// Summary text used when there is nothing to summarize.
pub const NO_SUMMARY: &str = "(no summary)";

const SUMMARY_INSTRUCTION: &str = "You are a helpful assistant that summarizes conversations. \
Provide a concise summary of the key topics discussed and the outcomes of the conversation.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub success: bool,
    pub summary: String,
}

impl SummaryResult {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRequester {
    client: OpenAiClient,
}

impl SummaryRequester {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }

    /// Summarize a transcript with a single completion request. An empty
    /// transcript is answered with [`NO_SUMMARY`] without calling upstream.
    pub async fn summarize(&self, transcript: &Transcript) -> Result<SummaryResult, UpstreamError> {
        if transcript.is_empty() {
            tracing::info!("Empty transcript — skipping summary request");
            return Ok(SummaryResult::ok(NO_SUMMARY));
        }

        let messages = summary_messages(transcript);
        let content = self.client.complete_chat(&messages).await?;

        let summary = content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string());

        tracing::info!(
            messages = transcript.len(),
            summary_chars = summary.len(),
            "Summarized conversation"
        );

        Ok(SummaryResult::ok(summary))
    }
}

/// Fixed system instruction plus the transcript JSON as the only user turn.
pub fn summary_messages(transcript: &Transcript) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_INSTRUCTION),
        ChatMessage::user(transcript.to_json()),
    ]
}
