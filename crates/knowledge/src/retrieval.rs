//! Document retrieval for the RAG specialist.

use std::sync::Arc;

use async_trait::async_trait;
use asclepius_common::{Document, DocumentRetriever, Result};
use tracing::debug;

use crate::store::DocumentStore;

/// Serves the top matching chunks of a [`DocumentStore`] as documents.
pub struct KnowledgeRetriever {
    store: Arc<DocumentStore>,
    top_k: usize,
    min_score: f32,
}

impl KnowledgeRetriever {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        let top_k = store.config().top_k;
        let min_score = store.config().min_score;
        Self {
            store,
            top_k,
            min_score,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl DocumentRetriever for KnowledgeRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let hits = self.store.search(query, self.top_k, self.min_score).await;
        debug!(hits = hits.len(), top_k = self.top_k, "Retrieved documents");

        Ok(hits
            .into_iter()
            .map(|(chunk, score)| Document {
                content: chunk.content,
                source: chunk.title,
                source_path: chunk.path,
                score,
            })
            .collect())
    }
}
