//! Web search processor: turns a query into a web-grounded answer.

use std::sync::Arc;

use async_trait::async_trait;
use asclepius_common::{MessageRole, Result, TranscriptEntry, WebResearcher, WebSearch};
use asclepius_llm::{LlmClient, LlmRequest};
use tracing::{debug, info};

/// Prior messages considered when rewriting the search query.
const HISTORY_MESSAGES: usize = 6;

/// Summarizes the user's intent into a search query, searches, and
/// synthesizes an answer from the results.
pub struct WebSearchProcessor {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn WebSearch>,
}

impl WebSearchProcessor {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn WebSearch>) -> Self {
        Self { llm, search }
    }

    fn intent_prompt(query: &str, history: &[TranscriptEntry]) -> String {
        let start = history.len().saturating_sub(HISTORY_MESSAGES);
        let recent: Vec<String> = history[start..]
            .iter()
            .filter(|entry| entry.role != MessageRole::System)
            .map(|entry| format!("{:?}: {}", entry.role, entry.content))
            .collect();

        format!(
            "Here are the last few messages from our conversation:\n\n{}\n\n\
             The user asked the following question:\n\n{query}\n\n\
             Rewrite this as a single, well-formed web search query. Use the earlier \
             conversation only if it is relevant to the current question. \
             Reply with the query only.",
            if recent.is_empty() {
                "(none)".to_string()
            } else {
                recent.join("\n")
            }
        )
    }

    fn answer_prompt(query: &str, results: &str) -> String {
        format!(
            "You are an AI assistant specialized in medical information. Below are web search \
             results retrieved for a user query. Summarize them into a helpful, concise response. \
             Rely on reputable sources only, ensure medical accuracy, and mention the sources you used.\n\n\
             Query: {query}\n\nWeb Search Results:\n{results}\n\nResponse:"
        )
    }

    /// Search query for `query`; falls back to the raw query if the model
    /// returns nothing usable.
    async fn summarize_intent(&self, query: &str, history: &[TranscriptEntry]) -> Result<String> {
        let response = self
            .llm
            .complete(LlmRequest::prompt(Self::intent_prompt(query, history)).with_temperature(0.0))
            .await?;
        let rewritten = response
            .content
            .trim()
            .trim_matches('"')
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(if rewritten.is_empty() {
            query.to_string()
        } else {
            rewritten
        })
    }
}

#[async_trait]
impl WebResearcher for WebSearchProcessor {
    async fn research(&self, query: &str, history: &[TranscriptEntry]) -> Result<String> {
        let search_query = self.summarize_intent(query, history).await?;
        info!(search_query = %search_query, "Searching the web");

        let results = self.search.search(&search_query).await?;
        debug!(result_chars = results.len(), "Web results received");

        let response = self
            .llm
            .complete(LlmRequest::prompt(Self::answer_prompt(query, &results)))
            .await?;
        Ok(response.content.trim().to_string())
    }
}
