//! Response synthesis over retrieved medical documents.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use asclepius_common::{
    Document, MessageRole, ResponseSynthesizer, Result, SourceRef, Synthesis, TranscriptEntry,
};
use asclepius_llm::{LlmClient, LlmRequest};
use tracing::debug;

/// Reply used when the context cannot answer the query. Contains the
/// insufficient-information marker so the dispatcher escalates.
pub const INSUFFICIENT_REPLY: &str =
    "Insufficient information to answer this question from the available medical documents.";

const DOCUMENT_SEPARATOR: &str = "\n\n===DOCUMENT SECTION===\n\n";

/// Prior messages included in the prompt.
const HISTORY_MESSAGES: usize = 6;

/// Answers a query from retrieved documents, citing their sources.
pub struct RagResponder {
    llm: Arc<dyn LlmClient>,
    include_sources: bool,
}

impl RagResponder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            include_sources: true,
        }
    }

    pub fn with_sources(mut self, include_sources: bool) -> Self {
        self.include_sources = include_sources;
        self
    }

    fn build_prompt(query: &str, context: &str, history: &[TranscriptEntry]) -> String {
        let history_text = format_history(history);
        format!(
            r#"You are a medical assistant providing accurate information based on verified medical sources.

Recent conversation:
{history_text}

The user has asked the following question:
{query}

Retrieved information:
{context}

Instructions:
1. Answer the question using ONLY the retrieved information above. Do not use prior knowledge.
2. If the retrieved information does not answer the question, reply with exactly:
   "{INSUFFICIENT_REPLY}"
3. Be concise and accurate. Use short markdown headings, lists, or tables where they help.
4. Present tabular data as markdown tables and explain what it shows.
5. Quote values exactly as they appear in the retrieved information.
6. Do not repeat the question and do not list references; sources are added separately.
7. Never invent source links.

Medical Assistant Response:"#
        )
    }
}

/// `User:` / `Assistant:` lines for the last few transcript messages.
fn format_history(history: &[TranscriptEntry]) -> String {
    let start = history.len().saturating_sub(HISTORY_MESSAGES);
    let lines: Vec<String> = history[start..]
        .iter()
        .filter_map(|entry| match entry.role {
            MessageRole::User => Some(format!("User: {}", entry.content)),
            MessageRole::Assistant => Some(format!("Assistant: {}", entry.content)),
            MessageRole::System => None,
        })
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Distinct sources, highest scoring first.
pub fn extract_sources(documents: &[Document]) -> Vec<SourceRef> {
    let mut ranked: Vec<&Document> = documents
        .iter()
        .filter(|doc| !doc.source.is_empty() && !doc.source_path.is_empty())
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|doc| seen.insert((doc.source.as_str(), doc.source_path.as_str())))
        .map(|doc| SourceRef {
            title: doc.source.clone(),
            path: doc.source_path.clone(),
        })
        .collect()
}

/// Mean score of the top three documents as returned.
pub fn confidence(documents: &[Document]) -> f32 {
    let top: Vec<f32> = documents.iter().take(3).map(|doc| doc.score).collect();
    if top.is_empty() {
        0.0
    } else {
        top.iter().sum::<f32>() / top.len() as f32
    }
}

#[async_trait]
impl ResponseSynthesizer for RagResponder {
    async fn synthesize(
        &self,
        query: &str,
        documents: &[Document],
        history: &[TranscriptEntry],
    ) -> Result<Synthesis> {
        if documents.is_empty() {
            debug!("No documents retrieved, skipping synthesis");
            return Ok(Synthesis {
                text: INSUFFICIENT_REPLY.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
            });
        }

        let context: Vec<&str> = documents.iter().map(|doc| doc.content.as_str()).collect();
        let prompt = Self::build_prompt(query, &context.join(DOCUMENT_SEPARATOR), history);
        let response = self.llm.complete(LlmRequest::prompt(prompt)).await?;

        let sources = extract_sources(documents);
        let mut synthesis = Synthesis {
            text: response.content.trim().to_string(),
            sources,
            confidence: confidence(documents),
        };

        if self.include_sources && !synthesis.sources.is_empty() && !synthesis.is_insufficient() {
            synthesis.text.push_str("\n\n##### Source documents:");
            for source in &synthesis.sources {
                synthesis
                    .text
                    .push_str(&format!("\n- [{}]({})", source.title, source.path));
            }
        }

        debug!(
            documents = documents.len(),
            sources = synthesis.sources.len(),
            confidence = synthesis.confidence,
            "Synthesized RAG response"
        );
        Ok(synthesis)
    }
}
