//! Collaborator traits consumed by the routing core.
//!
//! These traits live in `asclepius-common` so that the coordinator and the
//! agent implementations can reference them without depending on each other.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::TranscriptEntry;
use crate::Result;

/// Outcome of a safety classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum SafetyVerdict {
    Safe,
    Unsafe { message: String },
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Classifies raw user text before any specialist sees it.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict>;
}

/// General medical chat over the full conversation history.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    /// `history` ends with the current user message.
    async fn respond(&self, history: &[TranscriptEntry]) -> Result<String>;
}

/// A retrieved document chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    /// Human-readable source title
    pub source: String,
    pub source_path: String,
    /// Relevance score, higher is better
    pub score: f32,
}

#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub path: String,
}

/// An answer synthesized from retrieved documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
}

/// Phrase a synthesizer includes (in any case) when the documents do not
/// answer the query. Triggers escalation to web search.
pub const INSUFFICIENT_INFORMATION: &str = "insufficient information";

impl Synthesis {
    /// Whether the text admits the documents could not answer the query.
    pub fn is_insufficient(&self) -> bool {
        self.text.to_lowercase().contains(INSUFFICIENT_INFORMATION)
    }
}

#[async_trait]
pub trait ResponseSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        query: &str,
        documents: &[Document],
        history: &[TranscriptEntry],
    ) -> Result<Synthesis>;
}

/// Raw web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

/// Answers a query from the web: summarize intent, search, synthesize.
#[async_trait]
pub trait WebResearcher: Send + Sync {
    async fn research(&self, query: &str, history: &[TranscriptEntry]) -> Result<String>;
}

/// Assigns a subtype label to raw image bytes.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<String>;
}

/// Analyzes an image stored on disk.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_path: &Path) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_serializes_tagged() {
        let json = serde_json::to_value(SafetyVerdict::Unsafe {
            message: "blocked".into(),
        })
        .unwrap();
        assert_eq!(json["verdict"], "unsafe");
        assert_eq!(json["message"], "blocked");
        assert!(SafetyVerdict::Safe.is_safe());
    }

    #[test]
    fn insufficient_marker_is_case_insensitive() {
        let synthesis = |text: &str| Synthesis {
            text: text.to_string(),
            sources: Vec::new(),
            confidence: 0.0,
        };
        assert!(synthesis("INSUFFICIENT INFORMATION in the documents").is_insufficient());
        assert!(synthesis("There is Insufficient Information here.").is_insufficient());
        assert!(!synthesis("Flu causes fever.").is_insufficient());
    }
}
