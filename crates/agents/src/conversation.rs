//! General medical conversation agent.

use std::sync::Arc;

use async_trait::async_trait;
use asclepius_common::{ChatResponder, Result, TranscriptEntry};
use asclepius_llm::{history_messages, LlmClient, LlmRequest};
use tracing::debug;

const MEDICAL_CHAT_SYSTEM_PROMPT: &str = "You are a helpful, ethical medical assistant. \
Only provide general medical information, not specific diagnoses or treatment plans. \
Encourage the user to consult a healthcare professional when symptoms are severe, \
persistent, or worsening.";

/// Messages of history sent with each request.
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Answers general health questions over the conversation so far.
pub struct MedicalChatAgent {
    llm: Arc<dyn LlmClient>,
    history_limit: usize,
    temperature: Option<f32>,
}

impl MedicalChatAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            history_limit: DEFAULT_HISTORY_LIMIT,
            temperature: None,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatResponder for MedicalChatAgent {
    async fn respond(&self, history: &[TranscriptEntry]) -> Result<String> {
        let start = history.len().saturating_sub(self.history_limit);
        let request = LlmRequest {
            system_prompt: Some(MEDICAL_CHAT_SYSTEM_PROMPT.to_string()),
            messages: history_messages(&history[start..]),
            temperature: self.temperature,
            max_tokens: None,
        };

        debug!(messages = request.messages.len(), "Medical chat request");
        let response = self.llm.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asclepius_llm::{LlmResponse, Role};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLlm {
        requests: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(LlmResponse::text("rec", "  Rest and fluids usually help.  "))
        }
        fn model_name(&self) -> &str {
            "rec"
        }
    }

    #[tokio::test]
    async fn sends_system_prompt_and_history() {
        let llm = Arc::new(RecordingLlm::default());
        let agent = MedicalChatAgent::new(llm.clone());
        let history = vec![
            TranscriptEntry::user("I have a cold"),
            TranscriptEntry::assistant("CONVERSATION_AGENT", "Sorry to hear that."),
            TranscriptEntry::user("What should I do?"),
        ];

        let reply = agent.respond(&history).await.unwrap();

        assert_eq!(reply, "Rest and fluids usually help.");
        let requests = llm.requests.lock().unwrap();
        let request = &requests[0];
        assert!(request
            .system_prompt
            .as_deref()
            .unwrap()
            .contains("not specific diagnoses"));
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[2].role, Role::User);
        assert_eq!(request.messages[2].content, "What should I do?");
    }

    #[tokio::test]
    async fn history_is_windowed() {
        let llm = Arc::new(RecordingLlm::default());
        let agent = MedicalChatAgent::new(llm.clone()).with_history_limit(2);
        let history: Vec<_> = (0..5).map(|i| TranscriptEntry::user(format!("m{i}"))).collect();

        agent.respond(&history).await.unwrap();

        let requests = llm.requests.lock().unwrap();
        let contents: Vec<_> = requests[0].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }
}
