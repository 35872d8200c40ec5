//! Error types for Asclepius.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsclepiusError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Safety classifier error: {0}")]
    Safety(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Web search error: {0}")]
    WebSearch(String),

    #[error("Image classifier error: {0}")]
    Classifier(String),

    #[error("Image analysis error: {0}")]
    ImageAnalysis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{collaborator} timed out after {}ms", elapsed.as_millis())]
    Timeout {
        collaborator: &'static str,
        elapsed: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AsclepiusError {
    /// Whether a retry of the same request might succeed.
    ///
    /// Only transport-level LLM failures (rate limits, 5xx) and timeouts qualify.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Llm(msg) => {
                let lower = msg.to_lowercase();
                // Status codes count only as whole tokens, not inside "4500"
                lower
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|token| matches!(token, "429" | "500" | "502" | "503" | "504"))
                    || lower.contains("rate limit")
                    || lower.contains("server error")
                    || lower.contains("bad gateway")
                    || lower.contains("service unavailable")
                    || lower.contains("gateway timeout")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AsclepiusError>;
