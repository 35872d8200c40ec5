//! Tavily web search client.

use std::time::Duration;

use async_trait::async_trait;
use asclepius_common::{AsclepiusError, Result, WebSearch};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::WebSearchConfig;

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// [`WebSearch`] backed by the Tavily search API.
///
/// A missing API key is reported when a search is attempted, so the service
/// still starts without web search configured.
pub struct TavilySearch {
    api_url: String,
    api_key: Option<String>,
    max_results: usize,
    search_depth: String,
    http_client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(config: &WebSearchConfig) -> Self {
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            info!("No Tavily API key configured; web search will be unavailable");
        }
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    fn format_results(response: &SearchResponse) -> String {
        let mut out = String::from("Tavily Results:\n");
        if let Some(answer) = response.answer.as_deref().filter(|a| !a.is_empty()) {
            out.push_str(&format!("Summary: {answer}\n\n"));
        }
        if response.results.is_empty() {
            out.push_str("No results found.\n");
        }
        for (i, result) in response.results.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\nURL: {}\n{}\n\n",
                i + 1,
                result.title,
                result.url,
                result.content.trim()
            ));
        }
        out
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AsclepiusError::WebSearch(
                "Tavily API key not found. Set TAVILY_API_KEY or web_search.api_key in config."
                    .to_string(),
            )
        })?;

        let body = SearchRequest {
            api_key,
            query,
            search_depth: &self.search_depth,
            max_results: self.max_results,
            include_answer: true,
        };

        debug!(query = %query, "Tavily search");
        let response = self
            .http_client
            .post(format!("{}/search", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AsclepiusError::WebSearch(format!("Tavily request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AsclepiusError::WebSearch(format!(
                "Tavily API error {status}: {text}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AsclepiusError::WebSearch(format!("Failed to parse Tavily response: {e}")))?;

        debug!(results = parsed.results.len(), "Tavily search complete");
        Ok(Self::format_results(&parsed))
    }
}
