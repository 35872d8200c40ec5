//! Specialist identifiers and routing selections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A responder capable of producing the final answer for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Specialist {
    /// General health chat over the full transcript
    ConversationAgent,
    /// Answers from the medical document store
    RagAgent,
    /// Answers from live web search results
    WebSearchProcessorAgent,
    /// Analyzes uploaded medical images
    ImageAnalysisAgent,
}

impl Specialist {
    pub const ALL: [Specialist; 4] = [
        Specialist::ConversationAgent,
        Specialist::RagAgent,
        Specialist::WebSearchProcessorAgent,
        Specialist::ImageAnalysisAgent,
    ];

    /// Specialists the decision oracle may choose for text input.
    pub const ROUTABLE: [Specialist; 3] = [
        Specialist::ConversationAgent,
        Specialist::RagAgent,
        Specialist::WebSearchProcessorAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialist::ConversationAgent => "CONVERSATION_AGENT",
            Specialist::RagAgent => "RAG_AGENT",
            Specialist::WebSearchProcessorAgent => "WEB_SEARCH_PROCESSOR_AGENT",
            Specialist::ImageAnalysisAgent => "IMAGE_ANALYSIS_AGENT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Specialist::ConversationAgent => "Handles general health queries or ambiguous input.",
            Specialist::RagAgent => "Retrieves and answers based on a medical document database.",
            Specialist::WebSearchProcessorAgent => {
                "Searches the web for real-time or uncommon questions."
            }
            Specialist::ImageAnalysisAgent => "Analyzes uploaded medical images.",
        }
    }

    pub fn is_routable(&self) -> bool {
        Self::ROUTABLE.contains(self)
    }
}

impl fmt::Display for Specialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSpecialist(pub String);

impl fmt::Display for UnknownSpecialist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown specialist '{}'", self.0)
    }
}

impl std::error::Error for UnknownSpecialist {}

impl FromStr for Specialist {
    type Err = UnknownSpecialist;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|specialist| specialist.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownSpecialist(name.to_string()))
    }
}

/// The routing state of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentSelection {
    Specialist(Specialist),
    /// Rejected by the safety gate
    Blocked,
    /// A name supplied from outside the closed specialist set
    Unrecognized(String),
}

impl AgentSelection {
    pub const BLOCKED: &'static str = "BLOCKED";

    /// Parse an external agent name. Never fails: unknown names are kept
    /// verbatim as `Unrecognized`.
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(Self::BLOCKED) {
            return AgentSelection::Blocked;
        }
        match name.parse::<Specialist>() {
            Ok(specialist) => AgentSelection::Specialist(specialist),
            Err(UnknownSpecialist(raw)) => AgentSelection::Unrecognized(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AgentSelection::Specialist(specialist) => specialist.as_str(),
            AgentSelection::Blocked => Self::BLOCKED,
            AgentSelection::Unrecognized(name) => name,
        }
    }

    pub fn specialist(&self) -> Option<Specialist> {
        match self {
            AgentSelection::Specialist(specialist) => Some(*specialist),
            _ => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, AgentSelection::Blocked)
    }
}

impl From<Specialist> for AgentSelection {
    fn from(specialist: Specialist) -> Self {
        AgentSelection::Specialist(specialist)
    }
}

impl fmt::Display for AgentSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AgentSelection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AgentSelection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(AgentSelection::parse(&name))
    }
}
