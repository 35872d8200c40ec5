//! Medical image analysis with an Ollama vision model.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use asclepius_common::{AsclepiusError, ImageAnalyzer, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VisionConfig;

#[derive(Serialize)]
struct VisionRequest {
    model: String,
    messages: Vec<VisionMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct VisionMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct VisionResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Sends the image file to Ollama's `/api/chat` as base64.
pub struct OllamaVisionAnalyzer {
    base_url: String,
    model: String,
    prompt: String,
    http_client: reqwest::Client,
}

impl OllamaVisionAnalyzer {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    fn build_request(&self, image: &[u8]) -> VisionRequest {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        VisionRequest {
            model: self.model.clone(),
            messages: vec![VisionMessage {
                role: "user".to_string(),
                content: self.prompt.clone(),
                images: vec![encoded],
            }],
            stream: false,
        }
    }
}

#[async_trait]
impl ImageAnalyzer for OllamaVisionAnalyzer {
    async fn analyze(&self, image_path: &Path) -> Result<String> {
        let image = tokio::fs::read(image_path).await.map_err(|e| {
            AsclepiusError::ImageAnalysis(format!("Failed to read {}: {e}", image_path.display()))
        })?;
        info!(model = %self.model, bytes = image.len(), "Analyzing image");

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.build_request(&image))
            .send()
            .await
            .map_err(|e| AsclepiusError::ImageAnalysis(format!("Vision request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AsclepiusError::ImageAnalysis(format!(
                "Vision API error {status}: {text}"
            )));
        }

        let parsed: VisionResponse = response.json().await.map_err(|e| {
            AsclepiusError::ImageAnalysis(format!("Failed to parse vision response: {e}"))
        })?;

        let analysis = parsed.message.content.trim().to_string();
        if analysis.is_empty() {
            return Err(AsclepiusError::ImageAnalysis(
                "Vision model returned an empty analysis".to_string(),
            ));
        }
        debug!(chars = analysis.len(), "Image analysis complete");
        Ok(analysis)
    }
}
