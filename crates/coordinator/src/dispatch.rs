//! Specialist Dispatch: invokes the selected specialist and records its reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use asclepius_common::{
    AgentSelection, ChatResponder, DocumentRetriever, ImageAnalyzer, ResponseSynthesizer, Specialist,
    TranscriptEntry, TurnContext, WebResearcher,
};
use tracing::{debug, error, info, warn};

use crate::deadline::with_deadline;
use crate::scratch::ScratchStore;
use crate::stage::Stage;

pub const CHAT_APOLOGY: &str = "⚠️ Sorry, I encountered an issue generating a response.";
pub const RAG_APOLOGY: &str =
    "⚠️ Sorry, I couldn't search the medical documents right now. Please try again.";
pub const WEB_APOLOGY: &str = "⚠️ Sorry, I couldn't complete the web search right now. Please try again.";
pub const NO_IMAGE_PROVIDED: &str = "No image provided. Please upload an image to analyze.";
pub const UNPROCESSABLE: &str = "⚠️ Could not process your request. Please try again.";

/// Selection recorded when a turn reaches dispatch without one.
pub const UNSELECTED: &str = "UNSELECTED";

/// The outcome of one specialist invocation.
struct Reply {
    responder: Specialist,
    text: String,
    /// Specialist whose answer was replaced by `responder`
    escalated_from: Option<Specialist>,
}

impl Reply {
    fn new(responder: Specialist, text: impl Into<String>) -> Self {
        Self {
            responder,
            text: text.into(),
            escalated_from: None,
        }
    }
}

pub struct SpecialistDispatch {
    chat: Arc<dyn ChatResponder>,
    retriever: Arc<dyn DocumentRetriever>,
    synthesizer: Arc<dyn ResponseSynthesizer>,
    researcher: Arc<dyn WebResearcher>,
    analyzer: Arc<dyn ImageAnalyzer>,
    scratch: ScratchStore,
    timeout: Option<Duration>,
}

impl SpecialistDispatch {
    pub fn new(
        chat: Arc<dyn ChatResponder>,
        retriever: Arc<dyn DocumentRetriever>,
        synthesizer: Arc<dyn ResponseSynthesizer>,
        researcher: Arc<dyn WebResearcher>,
        analyzer: Arc<dyn ImageAnalyzer>,
        scratch: ScratchStore,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            chat,
            retriever,
            synthesizer,
            researcher,
            analyzer,
            scratch,
            timeout,
        }
    }

    async fn converse(&self, ctx: &TurnContext) -> Reply {
        let mut history = ctx.transcript().entries().to_vec();
        history.push(TranscriptEntry::user(ctx.user_message()));

        let text = match with_deadline("chat responder", self.timeout, self.chat.respond(&history)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Chat responder failed");
                CHAT_APOLOGY.to_string()
            }
        };
        Reply::new(Specialist::ConversationAgent, text)
    }

    async fn search_documents(&self, ctx: &TurnContext) -> Reply {
        let query = ctx.input();
        let history = ctx.transcript().entries();

        let documents = match with_deadline("document retriever", self.timeout, self.retriever.retrieve(query)).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Document retrieval failed");
                return Reply::new(Specialist::RagAgent, RAG_APOLOGY);
            }
        };
        debug!(turn_id = %ctx.turn_id(), documents = documents.len(), "Retrieved documents");

        let synthesis = match with_deadline(
            "response synthesizer",
            self.timeout,
            self.synthesizer.synthesize(query, &documents, history),
        )
        .await
        {
            Ok(synthesis) => synthesis,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Response synthesis failed");
                return Reply::new(Specialist::RagAgent, RAG_APOLOGY);
            }
        };

        if !synthesis.is_insufficient() {
            return Reply::new(Specialist::RagAgent, synthesis.text);
        }

        info!(turn_id = %ctx.turn_id(), "Documents insufficient, escalating to web search");
        let mut reply = self.search_web(ctx).await;
        reply.escalated_from = Some(Specialist::RagAgent);
        reply
    }

    async fn search_web(&self, ctx: &TurnContext) -> Reply {
        let research = self.researcher.research(ctx.input(), ctx.transcript().entries());
        let text = match with_deadline("web researcher", self.timeout, research).await {
            Ok(text) => text,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Web research failed");
                WEB_APOLOGY.to_string()
            }
        };
        Reply::new(Specialist::WebSearchProcessorAgent, text)
    }

    async fn analyze_image(&self, ctx: &TurnContext) -> Reply {
        let Some(image) = ctx.image_payload() else {
            return Reply::new(Specialist::ImageAnalysisAgent, NO_IMAGE_PROVIDED);
        };

        let file = match self.scratch.write(ctx.turn_id(), image) {
            Ok(file) => file,
            Err(e) => {
                error!(turn_id = %ctx.turn_id(), error = %e, "Failed to write scratch image");
                return Reply::new(Specialist::ImageAnalysisAgent, format!("❌ Image analysis failed: {e}"));
            }
        };

        let analysis = with_deadline("image analyzer", self.timeout, self.analyzer.analyze(file.path())).await;
        drop(file);

        let text = match analysis {
            Ok(text) => text,
            Err(e) => {
                warn!(turn_id = %ctx.turn_id(), error = %e, "Image analysis failed");
                format!("❌ Image analysis failed: {e}")
            }
        };
        Reply::new(Specialist::ImageAnalysisAgent, text)
    }

    /// Invoke the selected specialist and record its reply. Blocked turns
    /// pass through unchanged.
    pub async fn dispatch(&self, ctx: TurnContext) -> TurnContext {
        let specialist = match ctx.selected_agent() {
            Some(AgentSelection::Specialist(specialist)) => *specialist,
            Some(AgentSelection::Blocked) => return ctx,
            Some(AgentSelection::Unrecognized(name)) => {
                error!(turn_id = %ctx.turn_id(), agent = %name, "No specialist registered for agent");
                let responder = AgentSelection::Unrecognized(name.clone());
                return ctx.complete(responder, UNPROCESSABLE);
            }
            None => {
                error!(turn_id = %ctx.turn_id(), "Turn reached dispatch without a selected agent");
                return ctx.complete(AgentSelection::Unrecognized(UNSELECTED.into()), UNPROCESSABLE);
            }
        };

        let reply = match specialist {
            Specialist::ConversationAgent => self.converse(&ctx).await,
            Specialist::RagAgent => self.search_documents(&ctx).await,
            Specialist::WebSearchProcessorAgent => self.search_web(&ctx).await,
            Specialist::ImageAnalysisAgent => self.analyze_image(&ctx).await,
        };

        debug!(turn_id = %ctx.turn_id(), agent = %reply.responder, "Specialist replied");
        let ctx = match reply.escalated_from {
            Some(from) => ctx.involve(from),
            None => ctx,
        };
        ctx.complete(reply.responder, reply.text)
    }
}

#[async_trait]
impl Stage for SpecialistDispatch {
    fn name(&self) -> &'static str {
        "specialist_dispatch"
    }

    async fn run(&self, ctx: TurnContext) -> TurnContext {
        self.dispatch(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asclepius_common::{AsclepiusError, Document, Result, SourceRef, Synthesis, Transcript};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Mocks {
        chat_calls: AtomicUsize,
        retrieve_calls: AtomicUsize,
        research_calls: AtomicUsize,
        analyze_calls: AtomicUsize,
        seen_paths: Mutex<Vec<PathBuf>>,
        chat_history_len: AtomicUsize,
        synthesis: Mutex<Option<String>>,
        fail_analysis: bool,
    }

    #[async_trait]
    impl ChatResponder for Mocks {
        async fn respond(&self, history: &[TranscriptEntry]) -> Result<String> {
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            self.chat_history_len.store(history.len(), Ordering::SeqCst);
            Ok("Drink fluids and rest.".into())
        }
    }

    #[async_trait]
    impl DocumentRetriever for Mocks {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>> {
            self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Document {
                content: "Influenza causes fever.".into(),
                source: "Influenza".into(),
                source_path: "flu.md".into(),
                score: 0.9,
            }])
        }
    }

    #[async_trait]
    impl ResponseSynthesizer for Mocks {
        async fn synthesize(&self, _q: &str, _d: &[Document], _h: &[TranscriptEntry]) -> Result<Synthesis> {
            let text = self.synthesis.lock().unwrap().clone();
            text.map(|text| Synthesis {
                text,
                sources: vec![SourceRef {
                    title: "Influenza".into(),
                    path: "flu.md".into(),
                }],
                confidence: 0.9,
            })
            .ok_or_else(|| AsclepiusError::Llm("synthesis offline".into()))
        }
    }

    #[async_trait]
    impl WebResearcher for Mocks {
        async fn research(&self, _query: &str, _history: &[TranscriptEntry]) -> Result<String> {
            self.research_calls.fetch_add(1, Ordering::SeqCst);
            Ok("From the web: new guidance.".into())
        }
    }

    #[async_trait]
    impl ImageAnalyzer for Mocks {
        async fn analyze(&self, path: &Path) -> Result<String> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_paths.lock().unwrap().push(path.to_path_buf());
            assert!(path.exists());
            if self.fail_analysis {
                return Err(AsclepiusError::ImageAnalysis("model crashed".into()));
            }
            Ok("No fracture visible.".into())
        }
    }

    fn dispatch(mocks: Arc<Mocks>, scratch: &Path) -> SpecialistDispatch {
        SpecialistDispatch::new(
            mocks.clone(),
            mocks.clone(),
            mocks.clone(),
            mocks.clone(),
            mocks,
            ScratchStore::new(scratch).unwrap(),
            None,
        )
    }

    fn text_turn(input: &str, specialist: Specialist) -> TurnContext {
        TurnContext::text(input, Transcript::new())
            .clear_safety()
            .select(specialist)
    }

    #[tokio::test]
    async fn conversation_sees_history_plus_user_message() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());
        let mut transcript = Transcript::new();
        transcript.push(TranscriptEntry::user("hi"));
        transcript.push(TranscriptEntry::assistant("CONVERSATION_AGENT", "hello"));
        let ctx = TurnContext::text("I have a cold", transcript).select(Specialist::ConversationAgent);

        let ctx = dispatch(mocks.clone(), dir.path()).run(ctx).await;

        assert_eq!(mocks.chat_history_len.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.response_text(), Some("Drink fluids and rest."));
        assert_eq!(ctx.transcript().len(), 4);
    }

    #[tokio::test]
    async fn rag_answer_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());
        *mocks.synthesis.lock().unwrap() = Some("Fever and cough.".into());

        let ctx = dispatch(mocks.clone(), dir.path())
            .run(text_turn("flu symptoms?", Specialist::RagAgent))
            .await;

        assert_eq!(ctx.response_text(), Some("Fever and cough."));
        assert_eq!(ctx.involved_agents(), &[AgentSelection::from(Specialist::RagAgent)]);
        assert_eq!(mocks.research_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn insufficient_rag_escalates_to_web() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());
        *mocks.synthesis.lock().unwrap() = Some("Insufficient Information in the documents.".into());

        let ctx = dispatch(mocks.clone(), dir.path())
            .run(text_turn("rare syndrome?", Specialist::RagAgent))
            .await;

        assert_eq!(ctx.response_text(), Some("From the web: new guidance."));
        assert_eq!(
            ctx.involved_agents().last(),
            Some(&AgentSelection::from(Specialist::WebSearchProcessorAgent))
        );
        assert_eq!(ctx.selected_specialist(), Some(Specialist::WebSearchProcessorAgent));
        assert_eq!(ctx.transcript().len(), 2);
    }

    #[tokio::test]
    async fn synthesis_error_apologizes_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());

        let ctx = dispatch(mocks.clone(), dir.path())
            .run(text_turn("flu?", Specialist::RagAgent))
            .await;

        assert_eq!(ctx.response_text(), Some(RAG_APOLOGY));
        assert_eq!(ctx.selected_specialist(), Some(Specialist::RagAgent));
        assert_eq!(mocks.research_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_without_payload_skips_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());
        let ctx = TurnContext::image("", None, Transcript::new()).select(Specialist::ImageAnalysisAgent);

        let ctx = dispatch(mocks.clone(), dir.path()).run(ctx).await;

        assert_eq!(ctx.response_text(), Some(NO_IMAGE_PROVIDED));
        assert_eq!(mocks.analyze_calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn scratch_file_removed_on_success_and_failure() {
        for fail_analysis in [false, true] {
            let dir = tempfile::tempdir().unwrap();
            let mocks = Arc::new(Mocks {
                fail_analysis,
                ..Mocks::default()
            });
            let ctx = TurnContext::image("look", Some(vec![0xFF, 0xD8, 0xFF]), Transcript::new())
                .select(Specialist::ImageAnalysisAgent);

            let ctx = dispatch(mocks.clone(), dir.path()).run(ctx).await;

            let paths = mocks.seen_paths.lock().unwrap();
            assert_eq!(paths.len(), 1);
            assert!(!paths[0].exists());
            let response = ctx.response_text().unwrap();
            if fail_analysis {
                assert!(response.starts_with("❌ Image analysis failed:"));
            } else {
                assert_eq!(response, "No fracture visible.");
            }
        }
    }

    #[tokio::test]
    async fn unrecognized_agent_gets_generic_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());
        let ctx = TurnContext::text("hi", Transcript::new()).select(AgentSelection::parse("SURGEON_AGENT"));

        let ctx = dispatch(mocks.clone(), dir.path()).run(ctx).await;

        assert_eq!(ctx.response_text(), Some(UNPROCESSABLE));
        assert_eq!(ctx.involved_agents(), &[AgentSelection::Unrecognized("SURGEON_AGENT".into())]);
        assert_eq!(mocks.chat_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blocked_turn_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mocks = Arc::new(Mocks::default());
        let ctx = TurnContext::text("bad", Transcript::new()).block("no");

        let ctx = dispatch(mocks.clone(), dir.path()).run(ctx).await;

        assert_eq!(ctx.response_text(), Some("no"));
        assert_eq!(ctx.transcript().len(), 1);
    }
}
