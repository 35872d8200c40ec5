//! Specialist Router: asks the decision oracle which specialist should answer.
//!
//! The oracle reply is parsed best-effort. Anything that does not name a
//! routable specialist falls back to [`Specialist::ConversationAgent`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use asclepius_common::{InputType, Specialist, TurnContext, UnknownSpecialist};
use asclepius_llm::{extract_json_object, history_messages, ChatMessage, LlmClient, LlmRequest};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::deadline::with_deadline;
use crate::stage::Stage;

/// Why an oracle reply could not be turned into a routing decision.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedDecision {
    #[error("reply contains no JSON object")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("agent_name field missing")]
    MissingAgentName,

    #[error(transparent)]
    UnknownAgent(#[from] UnknownSpecialist),

    #[error("{0} cannot be chosen for text input")]
    NotRoutable(Specialist),
}

#[derive(Deserialize)]
struct Decision {
    agent_name: Option<String>,
}

/// Parse an oracle reply into a routable specialist.
pub fn parse_decision(reply: &str) -> Result<Specialist, MalformedDecision> {
    let object = extract_json_object(reply).ok_or(MalformedDecision::NoJson)?;
    let decision: Decision =
        serde_json::from_str(object).map_err(|e| MalformedDecision::InvalidJson(e.to_string()))?;
    let name = decision
        .agent_name
        .filter(|name| !name.trim().is_empty())
        .ok_or(MalformedDecision::MissingAgentName)?;
    let specialist: Specialist = name.parse()?;
    if !specialist.is_routable() {
        return Err(MalformedDecision::NotRoutable(specialist));
    }
    Ok(specialist)
}

/// Build the routing prompt for `query`.
pub fn routing_prompt(query: &str) -> String {
    let agents: String = Specialist::ROUTABLE
        .iter()
        .map(|specialist| format!("- {}: {}\n", specialist, specialist.description()))
        .collect();

    format!(
        "You are a decision-making agent that decides which specialist agent should respond \
         to the user's medical query.\n\n\
         List of agents:\n{agents}\n\
         Given the user's input: \"{query}\", respond ONLY as a JSON object like: \
         {{\"agent_name\": \"RAG_AGENT\"}}"
    )
}

pub struct SpecialistRouter {
    llm: Arc<dyn LlmClient>,
    timeout: Option<Duration>,
    temperature: f32,
}

impl SpecialistRouter {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Option<Duration>, temperature: f32) -> Self {
        Self {
            llm,
            timeout,
            temperature,
        }
    }

    /// Select a specialist for a text turn. Image turns keep the agent set
    /// by modality detection. Never fails.
    pub async fn route(&self, ctx: TurnContext) -> TurnContext {
        if ctx.is_blocked() || ctx.input_type() == InputType::Image {
            return ctx;
        }

        let mut messages = history_messages(ctx.transcript().entries());
        messages.push(ChatMessage::user(routing_prompt(ctx.input())));
        let request = LlmRequest {
            messages,
            ..LlmRequest::default()
        }
        .with_temperature(self.temperature);

        let reply = match with_deadline("decision oracle", self.timeout, self.llm.complete(request)).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Decision oracle failed, using conversation agent");
                return ctx.select(Specialist::ConversationAgent);
            }
        };

        match parse_decision(&reply) {
            Ok(specialist) => {
                debug!(turn_id = %ctx.turn_id(), agent = %specialist, "Routed turn");
                ctx.select(specialist)
            }
            Err(e) => {
                warn!(
                    turn_id = %ctx.turn_id(),
                    error = %e,
                    raw = %reply,
                    "Malformed routing decision, using conversation agent"
                );
                ctx.select(Specialist::ConversationAgent)
            }
        }
    }
}

#[async_trait]
impl Stage for SpecialistRouter {
    fn name(&self) -> &'static str {
        "specialist_router"
    }

    async fn run(&self, ctx: TurnContext) -> TurnContext {
        self.route(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asclepius_common::{AgentSelection, AsclepiusError, Result, Transcript, TranscriptEntry};
    use asclepius_llm::LlmResponse;
    use std::sync::Mutex;

    struct ScriptedOracle {
        reply: Option<String>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedOracle {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedOracle {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(request);
            self.reply
                .clone()
                .map(|reply| LlmResponse::text("mock", reply))
                .ok_or_else(|| AsclepiusError::Llm("connection refused".into()))
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    async fn route(oracle: Arc<ScriptedOracle>, ctx: TurnContext) -> TurnContext {
        SpecialistRouter::new(oracle, None, 0.0).run(ctx).await
    }

    #[test]
    fn parses_well_formed_decisions() {
        assert_eq!(parse_decision(r#"{"agent_name": "RAG_AGENT"}"#), Ok(Specialist::RagAgent));
        assert_eq!(
            parse_decision("```json\n{\"agent_name\": \"web_search_processor_agent\"}\n```"),
            Ok(Specialist::WebSearchProcessorAgent)
        );
    }

    #[test]
    fn rejects_malformed_decisions() {
        assert_eq!(parse_decision("yes"), Err(MalformedDecision::NoJson));
        assert_eq!(parse_decision(r#"{"agent_na"#), Err(MalformedDecision::NoJson));
        assert_eq!(parse_decision(r#"{"agent": "RAG_AGENT"}"#), Err(MalformedDecision::MissingAgentName));
        assert!(matches!(parse_decision(r#"{"agent_name": 3}"#), Err(MalformedDecision::InvalidJson(_))));
        assert!(matches!(
            parse_decision(r#"{"agent_name": "SURGEON_AGENT"}"#),
            Err(MalformedDecision::UnknownAgent(_))
        ));
        assert_eq!(
            parse_decision(r#"{"agent_name": "IMAGE_ANALYSIS_AGENT"}"#),
            Err(MalformedDecision::NotRoutable(Specialist::ImageAnalysisAgent))
        );
        assert!(parse_decision(r#"{"agent_name": "BLOCKED"}"#).is_err());
    }

    #[test]
    fn prompt_lists_routable_agents_and_query() {
        let prompt = routing_prompt("What is the latest flu vaccine?");
        for specialist in Specialist::ROUTABLE {
            assert!(prompt.contains(specialist.as_str()));
        }
        assert!(!prompt.contains("IMAGE_ANALYSIS_AGENT"));
        assert!(prompt.contains("\"What is the latest flu vaccine?\""));
        assert!(prompt.contains(r#"{"agent_name": "RAG_AGENT"}"#));
    }

    #[tokio::test]
    async fn routes_to_named_specialist() {
        let oracle = ScriptedOracle::replying(r#"{"agent_name": "WEB_SEARCH_PROCESSOR_AGENT"}"#);
        let ctx = route(oracle, TurnContext::text("news about measles", Transcript::new())).await;
        assert_eq!(ctx.selected_specialist(), Some(Specialist::WebSearchProcessorAgent));
        assert!(ctx.response_text().is_none());
        assert!(ctx.transcript().is_empty());
    }

    #[tokio::test]
    async fn malformed_reply_or_error_falls_back_to_conversation() {
        for oracle in [
            ScriptedOracle::replying("yes"),
            ScriptedOracle::replying(r#"{"agent_na"#),
            ScriptedOracle::failing(),
        ] {
            let ctx = route(oracle, TurnContext::text("hi", Transcript::new())).await;
            assert_eq!(ctx.selected_specialist(), Some(Specialist::ConversationAgent));
        }
    }

    #[tokio::test]
    async fn oracle_sees_history_then_prompt() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::user("I have a cough"));
        transcript.push(TranscriptEntry::assistant("CONVERSATION_AGENT", "How long?"));
        let oracle = ScriptedOracle::replying(r#"{"agent_name": "RAG_AGENT"}"#);

        route(oracle.clone(), TurnContext::text("two weeks", transcript)).await;

        let requests = oracle.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "I have a cough");
        assert!(messages[2].content.contains("\"two weeks\""));
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn text_turn_is_always_routed() {
        let oracle = ScriptedOracle::replying(r#"{"agent_name": "CONVERSATION_AGENT"}"#);

        let ctx = TurnContext::text("What is a fever?", Transcript::new())
            .select(Specialist::WebSearchProcessorAgent);
        let ctx = route(oracle.clone(), ctx).await;

        assert_eq!(ctx.selected_specialist(), Some(Specialist::ConversationAgent));
        assert_eq!(oracle.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn image_or_blocked_turns_skip_oracle() {
        let oracle = ScriptedOracle::replying(r#"{"agent_name": "RAG_AGENT"}"#);

        let preselected = TurnContext::image("", Some(vec![1]), Transcript::new())
            .select(Specialist::ImageAnalysisAgent);
        let ctx = route(oracle.clone(), preselected).await;
        assert_eq!(ctx.selected_specialist(), Some(Specialist::ImageAnalysisAgent));

        let blocked = TurnContext::text("bad", Transcript::new()).block("no");
        let ctx = route(oracle.clone(), blocked).await;
        assert_eq!(ctx.selected_agent(), Some(&AgentSelection::Blocked));

        assert!(oracle.requests.lock().unwrap().is_empty());
    }
}
