//! Knowledge types and configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A scored unit of a source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique ID, `<path>#<index>`
    pub id: String,

    /// Title of the source document
    pub title: String,

    /// Path of the source document
    pub path: String,

    /// Chunk text
    pub content: String,

    /// Term frequencies of the normalized content
    #[serde(skip)]
    pub terms: HashMap<String, u32>,
}

impl Chunk {
    pub fn new(title: &str, path: &str, index: usize, content: String) -> Self {
        let mut terms = HashMap::new();
        for term in tokenize(&content) {
            *terms.entry(term).or_insert(0) += 1;
        }
        Self {
            id: format!("{path}#{index}"),
            title: title.to_string(),
            path: path.to_string(),
            content,
            terms,
        }
    }

    /// Share of distinct query terms present in this chunk, in `[0, 1]`,
    /// with a small bonus for repeated mentions.
    pub fn score(&self, query_terms: &[String]) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let mut matched = 0usize;
        let mut repeats = 0u32;
        for term in query_terms {
            if let Some(&count) = self.terms.get(term) {
                matched += 1;
                repeats += count.saturating_sub(1);
            }
        }
        if matched == 0 {
            return 0.0;
        }
        let coverage = matched as f32 / query_terms.len() as f32;
        let bonus = (repeats as f32 * 0.02).min(0.1);
        (coverage * 0.9 + bonus).min(1.0)
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "me", "my", "of", "on", "or", "should", "that", "the", "this", "to",
    "what", "when", "which", "who", "why", "with", "you", "your",
];

/// Lowercased alphanumeric terms without stopwords, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 1)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Distinct query terms, first occurrence order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms = tokenize(query);
    let mut seen = std::collections::HashSet::new();
    terms.retain(|term| seen.insert(term.clone()));
    terms
}

/// Configuration for the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory of source documents loaded at startup
    #[serde(default)]
    pub docs_dir: Option<PathBuf>,

    /// File extensions to load
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Target chunk length in characters
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Maximum documents returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum score for a chunk to be returned
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

fn default_extensions() -> Vec<String> {
    vec!["md".into(), "txt".into()]
}

fn default_chunk_chars() -> usize {
    1200
}

fn default_top_k() -> usize {
    5
}

fn default_min_score() -> f32 {
    0.3
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            docs_dir: None,
            extensions: default_extensions(),
            chunk_chars: default_chunk_chars(),
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}
