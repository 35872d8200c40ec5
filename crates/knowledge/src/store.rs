//! In-memory document store.

use std::path::Path;

use asclepius_common::{AsclepiusError, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::types::{query_terms, Chunk, KnowledgeConfig};

/// Chunked medical documents, searchable by keyword overlap.
pub struct DocumentStore {
    config: KnowledgeConfig,
    chunks: RwLock<Vec<Chunk>>,
}

impl DocumentStore {
    pub fn new(config: KnowledgeConfig) -> Self {
        Self {
            config,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Create a store and load `docs_dir` if one is configured.
    pub async fn open(config: KnowledgeConfig) -> Result<Self> {
        let store = Self::new(config);
        if let Some(dir) = store.config.docs_dir.clone() {
            let loaded = store.load_dir(&dir).await?;
            info!(docs_dir = %dir.display(), documents = loaded, "Loaded knowledge base");
        } else {
            warn!("No docs_dir configured; knowledge base is empty");
        }
        Ok(store)
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Split `text` into chunks and add them. Returns the number of chunks.
    pub async fn add_document(&self, title: &str, path: &str, text: &str) -> usize {
        let chunks: Vec<Chunk> = split_paragraphs(text, self.config.chunk_chars)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk::new(title, path, i, content))
            .collect();
        let count = chunks.len();
        debug!(title = %title, path = %path, chunks = count, "Adding document");
        self.chunks.write().await.extend(chunks);
        count
    }

    /// Load every file under `dir` with a configured extension. Returns the
    /// number of documents loaded.
    pub async fn load_dir(&self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(AsclepiusError::Retrieval(format!(
                "Knowledge directory not found: {}",
                dir.display()
            )));
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                AsclepiusError::Retrieval(format!("Failed to walk {}: {e}", dir.display()))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !self.wants(path) {
                continue;
            }

            let text = match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            let title = document_title(path, &text);
            let relative = path.strip_prefix(dir).unwrap_or(path);
            self.add_document(&title, &relative.to_string_lossy(), &text)
                .await;
            loaded += 1;
        }
        Ok(loaded)
    }

    fn wants(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Chunks scoring at least `min_score`, best first, at most `limit`.
    pub async fn search(&self, query: &str, limit: usize, min_score: f32) -> Vec<(Chunk, f32)> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let chunks = self.chunks.read().await;
        let mut results: Vec<(Chunk, f32)> = chunks
            .iter()
            .filter_map(|chunk| {
                let score = chunk.score(&terms);
                (score > 0.0 && score >= min_score).then(|| (chunk.clone(), score))
            })
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        debug!(query = %query, terms = terms.len(), hits = results.len(), "Searched knowledge base");
        results
    }

    pub async fn count(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn clear(&self) {
        self.chunks.write().await.clear();
    }
}

/// First markdown heading, else the file stem.
fn document_title(path: &Path, text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|heading| heading.trim().to_string())
        .filter(|heading| !heading.is_empty())
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        })
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Group blank-line-separated paragraphs into chunks of roughly `max_chars`.
/// A single oversized paragraph becomes its own chunk.
fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
