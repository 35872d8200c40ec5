//! Turn Context: the state threaded through the routing pipeline.
//!
//! A `TurnContext` is moved from stage to stage. Every mutation goes through
//! a consuming method that returns the updated value, so a stage always hands
//! a complete context to the next one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentSelection, Specialist};
use crate::message::{Transcript, TranscriptEntry};

/// Subtype recorded when an image could not be classified.
pub const UNKNOWN_SUBTYPE: &str = "unknown";

/// Transcript text for an image turn submitted without accompanying text.
pub const IMAGE_PLACEHOLDER: &str = "[image uploaded]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Image,
}

#[derive(Debug, Clone)]
pub struct TurnContext {
    turn_id: Uuid,
    input: String,
    image: Option<Vec<u8>>,
    input_type: InputType,
    image_subtype: Option<String>,
    selected_agent: Option<AgentSelection>,
    response_text: Option<String>,
    involved_agents: Vec<AgentSelection>,
    safety_cleared: bool,
    transcript: Transcript,
}

impl TurnContext {
    /// Start a text turn on top of the session history.
    pub fn text(input: impl Into<String>, transcript: Transcript) -> Self {
        Self::new(InputType::Text, input.into(), None, transcript)
    }

    /// Start an image turn. An absent or empty payload is kept as-is and
    /// surfaces as a diagnostic at dispatch.
    pub fn image(input: impl Into<String>, image: Option<Vec<u8>>, transcript: Transcript) -> Self {
        Self::new(InputType::Image, input.into(), image, transcript)
    }

    fn new(
        input_type: InputType,
        input: String,
        image: Option<Vec<u8>>,
        transcript: Transcript,
    ) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            input,
            image,
            input_type,
            image_subtype: None,
            selected_agent: None,
            response_text: None,
            involved_agents: Vec::new(),
            safety_cleared: false,
            transcript,
        }
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// The image payload, if one with content was supplied.
    pub fn image_payload(&self) -> Option<&[u8]> {
        self.image.as_deref().filter(|bytes| !bytes.is_empty())
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn is_image(&self) -> bool {
        self.input_type == InputType::Image
    }

    pub fn image_subtype(&self) -> Option<&str> {
        self.image_subtype.as_deref()
    }

    pub fn selected_agent(&self) -> Option<&AgentSelection> {
        self.selected_agent.as_ref()
    }

    pub fn response_text(&self) -> Option<&str> {
        self.response_text.as_deref()
    }

    pub fn involved_agents(&self) -> &[AgentSelection] {
        &self.involved_agents
    }

    pub fn safety_cleared(&self) -> bool {
        self.safety_cleared
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.selected_agent, Some(AgentSelection::Blocked))
    }

    /// Text recorded as the user's message for this turn.
    pub fn user_message(&self) -> &str {
        if self.is_image() && self.input.trim().is_empty() {
            IMAGE_PLACEHOLDER
        } else {
            &self.input
        }
    }

    /// Reject the turn. The block message becomes the response and the only
    /// transcript entry the turn contributes.
    pub fn block(mut self, message: impl Into<String>) -> Self {
        if self.is_blocked() || self.response_text.is_some() {
            return self;
        }
        let message = message.into();
        self.transcript
            .push(TranscriptEntry::assistant(AgentSelection::BLOCKED, message.clone()));
        self.selected_agent = Some(AgentSelection::Blocked);
        self.involved_agents.push(AgentSelection::Blocked);
        self.response_text = Some(message);
        self
    }

    pub fn clear_safety(mut self) -> Self {
        if !self.is_blocked() {
            self.safety_cleared = true;
        }
        self
    }

    /// Record the image subtype. Ignored for text turns; an empty subtype is
    /// stored as [`UNKNOWN_SUBTYPE`].
    pub fn with_image_subtype(mut self, subtype: impl Into<String>) -> Self {
        if !self.is_image() {
            return self;
        }
        let subtype = subtype.into();
        let subtype = subtype.trim();
        self.image_subtype = Some(if subtype.is_empty() {
            UNKNOWN_SUBTYPE.to_string()
        } else {
            subtype.to_string()
        });
        self
    }

    /// Choose the agent for the turn. No-op once blocked.
    ///
    /// Only [`TurnContext::block`] can block a turn; selecting `Blocked`
    /// directly is recorded as an unrecognized agent.
    pub fn select(mut self, selection: impl Into<AgentSelection>) -> Self {
        if self.is_blocked() {
            return self;
        }
        let selection = match selection.into() {
            AgentSelection::Blocked => AgentSelection::Unrecognized(AgentSelection::BLOCKED.into()),
            other => other,
        };
        self.selected_agent = Some(selection);
        self
    }

    /// Record the outcome of an agent invocation that did not produce the
    /// final answer, e.g. a specialist whose reply triggered a fallback.
    pub fn involve(mut self, agent: impl Into<AgentSelection>) -> Self {
        if !self.is_blocked() {
            self.involved_agents.push(agent.into());
        }
        self
    }

    /// Finish the turn: append the user message and the responder's reply,
    /// record the responder, and set the response. No-op once blocked.
    pub fn complete(mut self, responder: impl Into<AgentSelection>, response: impl Into<String>) -> Self {
        if self.is_blocked() || self.response_text.is_some() {
            return self;
        }
        let responder = responder.into();
        let response = response.into();
        let user = TranscriptEntry::user(self.user_message());
        self.transcript.push(user);
        self.transcript
            .push(TranscriptEntry::assistant(responder.as_str(), response.clone()));
        self.involved_agents.push(responder.clone());
        self.selected_agent = Some(responder);
        self.response_text = Some(response);
        self
    }

    /// The specialist currently selected, if any.
    pub fn selected_specialist(&self) -> Option<Specialist> {
        self.selected_agent.as_ref().and_then(AgentSelection::specialist)
    }
}
