//! Default collaborators for the Asclepius routing core.
//!
//! Each type here implements one of the collaborator traits from
//! `asclepius-common`:
//!
//! - [`LlmGuardrails`]: safety classifier (injection screen + LLM policy check)
//! - [`SignatureClassifier`]: image subtype from file signature
//! - [`MedicalChatAgent`]: general medical conversation
//! - [`RagResponder`]: answer synthesis over retrieved documents
//! - [`WebSearchProcessor`] with [`TavilySearch`]: web-grounded answers
//! - [`OllamaVisionAnalyzer`]: image analysis with a vision model

pub mod classifier;
pub mod config;
pub mod conversation;
pub mod guardrails;
pub mod rag;
pub mod tavily;
pub mod vision;
pub mod web_search;

pub use classifier::SignatureClassifier;
pub use config::{AgentsConfig, GuardrailsConfig, VisionConfig, WebSearchConfig};
pub use conversation::MedicalChatAgent;
pub use guardrails::LlmGuardrails;
pub use rag::RagResponder;
pub use tavily::TavilySearch;
pub use vision::OllamaVisionAnalyzer;
pub use web_search::WebSearchProcessor;
