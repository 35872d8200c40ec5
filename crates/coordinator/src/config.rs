//! Configuration for the routing pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Deadline for each collaborator call; unset means no deadline
    #[serde(default)]
    pub collaborator_timeout_ms: Option<u64>,

    /// Directory for transient image files; defaults to `<tmp>/asclepius`
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Reply when the safety classifier cannot be reached
    #[serde(default = "default_unavailable_message")]
    pub unavailable_message: String,

    /// Sampling temperature for the routing decision
    #[serde(default = "default_router_temperature")]
    pub router_temperature: f32,

    /// Live session cap; the least recently active session is dropped to
    /// make room. 0 disables the cap
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions idle this long are dropped. 0 keeps them forever
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_unavailable_message() -> String {
    "⚠️ I can't verify this request right now. Please try again in a moment.".to_string()
}

fn default_router_temperature() -> f32 {
    0.0
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_session_idle_secs() -> u64 {
    3600
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            collaborator_timeout_ms: None,
            scratch_dir: None,
            unavailable_message: default_unavailable_message(),
            router_temperature: default_router_temperature(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl CoordinatorConfig {
    pub fn collaborator_timeout(&self) -> Option<Duration> {
        self.collaborator_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn session_limit(&self) -> Option<usize> {
        Some(self.max_sessions).filter(|max| *max > 0)
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        Some(self.session_idle_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("asclepius"))
    }
}
