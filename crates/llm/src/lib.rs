//! Language-model access for Asclepius.
//!
//! Every prompt in the system, including the routing decision oracle, goes
//! through the [`LlmClient`] trait.

pub mod client;
pub mod config;
pub mod json;
pub mod openai;
pub mod retry;

pub use client::{history_messages, ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{build_llm_client, LlmConfig, SemaphoredClient};
pub use json::extract_json_object;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
