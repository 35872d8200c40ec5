//! Conversation transcript types.

use serde::{Deserialize, Serialize};

/// Role of a transcript entry's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One message in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unique message ID
    pub id: String,

    /// Role of the author
    pub role: MessageRole,

    /// Message content
    pub content: String,

    /// Identifier of the agent that produced an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Timestamp (Unix millis)
    pub timestamp: u64,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), None)
    }

    pub fn assistant(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), Some(agent.into()))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into(), None)
    }

    fn new(role: MessageRole, content: String, agent: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            agent,
            timestamp: now_millis(),
        }
    }
}

/// Ordered, append-only message log.
///
/// Entries cannot be removed, reordered or edited once pushed. An older
/// clone is always a prefix of the current log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = TranscriptEntry>) {
        self.entries.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entries appended after the first `len` entries.
    pub fn since(&self, len: usize) -> &[TranscriptEntry] {
        self.entries.get(len..).unwrap_or(&[])
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a TranscriptEntry;
    type IntoIter = std::slice::Iter<'a, TranscriptEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
