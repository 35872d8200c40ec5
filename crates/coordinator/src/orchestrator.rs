//! The turn pipeline: Safety Gate → Modality Detector → Specialist Router →
//! Specialist Dispatch, run once per user turn.

use std::sync::Arc;

use asclepius_common::{
    AgentSelection, ChatResponder, DocumentRetriever, ImageAnalyzer, ImageClassifier, InputType,
    ResponseSynthesizer, Result, SafetyClassifier, Transcript, TurnContext, WebResearcher,
};
use asclepius_llm::LlmClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::dispatch::{SpecialistDispatch, UNPROCESSABLE, UNSELECTED};
use crate::modality::ModalityDetector;
use crate::router::SpecialistRouter;
use crate::safety::SafetyGate;
use crate::scratch::ScratchStore;
use crate::session::SessionRegistry;
use crate::stage::Stage;

/// External collaborators the pipeline calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub safety: Arc<dyn SafetyClassifier>,
    /// Decision oracle for the router
    pub router_llm: Arc<dyn LlmClient>,
    pub chat: Arc<dyn ChatResponder>,
    pub retriever: Arc<dyn DocumentRetriever>,
    pub synthesizer: Arc<dyn ResponseSynthesizer>,
    pub researcher: Arc<dyn WebResearcher>,
    /// Without a classifier every image gets the `unknown` subtype
    pub image_classifier: Option<Arc<dyn ImageClassifier>>,
    pub image_analyzer: Arc<dyn ImageAnalyzer>,
}

/// One user turn as submitted by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub text: String,
    /// Present for image uploads, even when empty
    #[serde(default, skip_serializing)]
    pub image: Option<Vec<u8>>,
}

impl TurnRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn image(text: impl Into<String>, image: Vec<u8>) -> Self {
        Self {
            text: text.into(),
            image: Some(image),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub session_id: String,
    pub turn_id: Uuid,
    pub input_type: InputType,
    pub selected_agent: AgentSelection,
    pub response: String,
    pub involved_agents: Vec<AgentSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_subtype: Option<String>,
    pub blocked: bool,
}

pub struct Orchestrator {
    stages: Vec<Box<dyn Stage>>,
    sessions: SessionRegistry,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, config: &CoordinatorConfig) -> Result<Self> {
        let timeout = config.collaborator_timeout();
        let scratch = ScratchStore::new(config.scratch_dir())?;
        info!(scratch_dir = %scratch.dir().display(), "Scratch directory ready");

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(SafetyGate::new(
                collaborators.safety,
                timeout,
                config.unavailable_message.clone(),
            )),
            Box::new(ModalityDetector::new(collaborators.image_classifier, timeout)),
            Box::new(SpecialistRouter::new(
                collaborators.router_llm,
                timeout,
                config.router_temperature,
            )),
            Box::new(SpecialistDispatch::new(
                collaborators.chat,
                collaborators.retriever,
                collaborators.synthesizer,
                collaborators.researcher,
                collaborators.image_analyzer,
                scratch,
                timeout,
            )),
        ];

        Ok(Self {
            stages,
            sessions: SessionRegistry::with_limits(
                config.session_limit(),
                config.session_idle_timeout(),
            ),
        })
    }

    /// Run one turn for `session_id`. Never fails: collaborator errors end up
    /// as response text.
    pub async fn submit(&self, session_id: &str, request: TurnRequest) -> TurnResult {
        let session = self.sessions.get_or_create(session_id).await;
        let _turn = session.begin_turn().await;

        let transcript = session.snapshot().await;
        let base_len = transcript.len();
        let ctx = self.start_turn(request, transcript);
        let turn_id = ctx.turn_id();

        let span = info_span!("turn", session_id = %session_id, turn_id = %turn_id);
        let ctx = self.run_stages(ctx).instrument(span).await;

        session.append(ctx.transcript().since(base_len)).await;

        let result = TurnResult {
            session_id: session_id.to_string(),
            turn_id,
            input_type: ctx.input_type(),
            selected_agent: ctx
                .selected_agent()
                .cloned()
                .unwrap_or_else(|| AgentSelection::Unrecognized(UNSELECTED.into())),
            response: ctx.response_text().unwrap_or(UNPROCESSABLE).to_string(),
            involved_agents: ctx.involved_agents().to_vec(),
            image_subtype: ctx.image_subtype().map(str::to_string),
            blocked: ctx.is_blocked(),
        };
        info!(
            session_id = %session_id,
            turn_id = %turn_id,
            agent = %result.selected_agent,
            blocked = result.blocked,
            "Turn complete"
        );
        result
    }

    fn start_turn(&self, request: TurnRequest, transcript: Transcript) -> TurnContext {
        match request.image {
            Some(image) => TurnContext::image(request.text, Some(image), transcript),
            None => TurnContext::text(request.text, transcript),
        }
    }

    async fn run_stages(&self, mut ctx: TurnContext) -> TurnContext {
        for stage in &self.stages {
            ctx = stage.run(ctx).await;
            debug!(stage = stage.name(), agent = ?ctx.selected_agent(), "Stage finished");
            if ctx.is_blocked() {
                break;
            }
        }
        ctx
    }

    /// The session's transcript, if the session exists.
    pub async fn transcript(&self, session_id: &str) -> Option<Transcript> {
        match self.sessions.get(session_id).await {
            Some(session) => Some(session.snapshot().await),
            None => None,
        }
    }

    pub async fn reset(&self, session_id: &str) -> bool {
        self.sessions.reset(session_id).await
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.count().await
    }
}
