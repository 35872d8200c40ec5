//! Configuration for the default collaborators.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// Reply shown to the user when input is rejected
    #[serde(default = "default_block_message")]
    pub block_message: String,
    /// Inputs longer than this are rejected without an LLM call
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_block_message() -> String {
    "I can only help with general health and medical questions. \
     I can't assist with that request."
        .to_string()
}

fn default_max_input_chars() -> usize {
    10_000
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            block_message: default_block_message(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Tavily API key; falls back to `TAVILY_API_KEY`
    pub api_key: Option<String>,
    #[serde(default = "default_tavily_url")]
    pub api_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// `basic` or `advanced`
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_tavily_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_depth() -> String {
    "basic".to_string()
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_tavily_url(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl WebSearchConfig {
    /// Resolve API key from config or the `TAVILY_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("TAVILY_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Ollama server hosting the vision model
    #[serde(default = "default_vision_url")]
    pub base_url: String,
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_vision_prompt")]
    pub prompt: String,
    #[serde(default = "default_vision_timeout")]
    pub timeout_secs: u64,
}

fn default_vision_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_vision_model() -> String {
    "llava".to_string()
}

fn default_vision_prompt() -> String {
    "You are assisting with a medical image. Describe the visible findings \
     in plain language, note the likely imaging modality, and point out anything \
     that may warrant attention from a clinician. Do not give a diagnosis."
        .to_string()
}

fn default_vision_timeout() -> u64 {
    120
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: default_vision_url(),
            model: default_vision_model(),
            prompt: default_vision_prompt(),
            timeout_secs: default_vision_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AgentsConfig = toml::from_str(
            r#"
[web_search]
max_results = 3

[vision]
model = "llava:13b"
"#,
        )
        .unwrap();

        assert_eq!(config.web_search.max_results, 3);
        assert_eq!(config.web_search.api_url, "https://api.tavily.com");
        assert_eq!(config.vision.model, "llava:13b");
        assert_eq!(config.vision.base_url, "http://localhost:11434");
        assert_eq!(config.guardrails.max_input_chars, 10_000);
    }

    #[test]
    fn configured_key_wins_over_env() {
        let config = WebSearchConfig {
            api_key: Some("tvly-config".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("tvly-config"));
    }
}
