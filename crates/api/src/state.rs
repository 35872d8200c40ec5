//! Application state for the API server.

use std::sync::Arc;
use std::time::Instant;

use asclepius_agents::{
    LlmGuardrails, MedicalChatAgent, OllamaVisionAnalyzer, RagResponder, SignatureClassifier,
    TavilySearch, WebSearchProcessor,
};
use asclepius_coordinator::{Collaborators, Orchestrator};
use asclepius_knowledge::{DocumentStore, KnowledgeRetriever};
use asclepius_llm::build_llm_client;
use tracing::info;

use crate::config::AppConfig;

/// Shared application state for the API server.
pub struct AppState {
    pub orchestrator: Orchestrator,

    /// Server start time (for health checks)
    pub start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            start_time: Instant::now(),
        }
    }

    /// Wire the default collaborators described by `config`.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let llm = build_llm_client(&config.llm)?;
        info!(provider = %config.llm.provider, model = %llm.model_name(), "LLM client ready");

        let store = Arc::new(DocumentStore::open(config.knowledge.clone()).await?);
        info!(chunks = store.count().await, "Knowledge store ready");

        let chat = MedicalChatAgent::new(llm.clone()).with_temperature(config.llm.temperature);
        let search = Arc::new(TavilySearch::new(&config.agents.web_search));

        let collaborators = Collaborators {
            safety: Arc::new(LlmGuardrails::new(llm.clone(), config.agents.guardrails.clone())),
            router_llm: llm.clone(),
            chat: Arc::new(chat),
            retriever: Arc::new(KnowledgeRetriever::new(store)),
            synthesizer: Arc::new(RagResponder::new(llm.clone())),
            researcher: Arc::new(WebSearchProcessor::new(llm, search)),
            image_classifier: Some(Arc::new(SignatureClassifier::new())),
            image_analyzer: Arc::new(OllamaVisionAnalyzer::new(&config.agents.vision)),
        };

        let orchestrator = Orchestrator::new(collaborators, &config.coordinator)?;
        Ok(Self::new(orchestrator))
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
