//! Routing core for the Asclepius medical assistant.
//!
//! Every user turn passes through four stages, in order:
//!
//! ```text
//! TurnRequest
//!      │
//!      ▼
//! ┌──────────────┐  unsafe   ┌─────────┐
//! │ Safety Gate  │──────────►│ BLOCKED │
//! └──────┬───────┘           └─────────┘
//!        ▼
//! ┌──────────────────┐
//! │ Modality Detector│  images → IMAGE_ANALYSIS_AGENT
//! └──────┬───────────┘
//!        ▼
//! ┌──────────────────┐
//! │ Specialist Router│  decision oracle picks a specialist
//! └──────┬───────────┘
//!        ▼
//! ┌────────────────────┐
//! │ Specialist Dispatch│  RAG ──insufficient──► web search
//! └────────────────────┘
//! ```
//!
//! The [`Orchestrator`] owns the stages and the per-session transcripts.

pub mod config;
pub mod deadline;
pub mod dispatch;
pub mod modality;
pub mod orchestrator;
pub mod router;
pub mod safety;
pub mod scratch;
pub mod session;
pub mod stage;

pub use config::CoordinatorConfig;
pub use dispatch::SpecialistDispatch;
pub use modality::ModalityDetector;
pub use orchestrator::{Collaborators, Orchestrator, TurnRequest, TurnResult};
pub use router::{parse_decision, MalformedDecision, SpecialistRouter};
pub use safety::SafetyGate;
pub use scratch::{ScratchFile, ScratchStore};
pub use session::{Session, SessionRegistry};
pub use stage::Stage;
