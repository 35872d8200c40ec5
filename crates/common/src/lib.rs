//! Common types and traits shared across Asclepius crates.
//!
//! This crate provides the turn state, transcript and collaborator
//! abstractions that the routing core and the agent implementations share.

pub mod agent;
pub mod error;
pub mod message;
pub mod traits;
pub mod turn;

pub use agent::{AgentSelection, Specialist, UnknownSpecialist};
pub use error::{AsclepiusError, Result};
pub use message::{MessageRole, Transcript, TranscriptEntry};
pub use traits::{
    ChatResponder, Document, DocumentRetriever, ImageAnalyzer, ImageClassifier, ResponseSynthesizer,
    SafetyClassifier, SafetyVerdict, SourceRef, Synthesis, WebResearcher, WebSearch,
    INSUFFICIENT_INFORMATION,
};
pub use turn::{InputType, TurnContext, IMAGE_PLACEHOLDER, UNKNOWN_SUBTYPE};
