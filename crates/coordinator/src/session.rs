//! Per-session transcripts and turn serialization.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use asclepius_common::{Transcript, TranscriptEntry};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::debug;

/// A conversation: its transcript and the lock that serializes its turns.
#[derive(Debug)]
pub struct Session {
    id: String,
    transcript: RwLock<Transcript>,
    turn: Mutex<()>,
    last_active: Mutex<Instant>,
}

impl Session {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transcript: RwLock::new(Transcript::new()),
            turn: Mutex::new(()),
            last_active: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hold this for the whole turn. Turns in other sessions are unaffected.
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub async fn snapshot(&self) -> Transcript {
        self.transcript.read().await.clone()
    }

    pub async fn append(&self, entries: &[TranscriptEntry]) {
        self.transcript.write().await.extend(entries.iter().cloned());
        self.touch().await;
    }

    pub async fn len(&self) -> usize {
        self.transcript.read().await.len()
    }

    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.last_active.lock().await.elapsed()
    }

    /// A turn is running right now.
    fn is_busy(&self) -> bool {
        self.turn.try_lock().is_err()
    }
}

/// Live sessions keyed by id.
///
/// New sessions first evict any that have been idle longer than the idle
/// timeout, then the least recently active ones until the registry is below
/// its capacity. Sessions with a turn in flight are never evicted.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: Option<usize>,
    idle_timeout: Option<Duration>,
}

impl SessionRegistry {
    /// A registry without limits.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: Option<usize>, idle_timeout: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.filter(|max| *max > 0),
            idle_timeout,
        }
    }

    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.get(id).await {
            session.touch().await;
            return session;
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id).cloned() {
            session.touch().await;
            return session;
        }
        self.evict(&mut sessions).await;

        let session = Arc::new(Session::new(id));
        sessions.insert(id.to_string(), session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Forget a session. Returns whether it existed.
    pub async fn reset(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Make room for one more session.
    async fn evict(&self, sessions: &mut HashMap<String, Arc<Session>>) {
        if self.max_sessions.is_none() && self.idle_timeout.is_none() {
            return;
        }

        let mut candidates = Vec::with_capacity(sessions.len());
        for (id, session) in sessions.iter() {
            if !session.is_busy() {
                candidates.push((session.idle_for().await, id.clone()));
            }
        }

        if let Some(timeout) = self.idle_timeout {
            candidates.retain(|(idle, id)| {
                if *idle < timeout {
                    return true;
                }
                sessions.remove(id);
                debug!(session_id = %id, idle_secs = idle.as_secs(), "Evicted idle session");
                false
            });
        }

        if let Some(max) = self.max_sessions {
            // Longest idle first
            candidates.sort_by(|a, b| b.0.cmp(&a.0));
            let mut oldest = candidates.into_iter();
            while sessions.len() >= max {
                let Some((_, id)) = oldest.next() else {
                    break;
                };
                sessions.remove(&id);
                debug!(session_id = %id, max_sessions = max, "Evicted session over capacity");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_same_session() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("abc").await;
        let b = registry.get_or_create("abc").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.count().await, 1);
        assert!(registry.get("other").await.is_none());
    }

    #[tokio::test]
    async fn append_extends_snapshot() {
        let registry = SessionRegistry::new();
        let session = registry.get_or_create("abc").await;
        session
            .append(&[TranscriptEntry::user("hi"), TranscriptEntry::assistant("CONVERSATION_AGENT", "hello")])
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        session.append(&[TranscriptEntry::user("again")]).await;
        // snapshots are detached copies
        assert_eq!(snapshot.len(), 2);
        assert_eq!(session.len().await, 3);
    }

    #[tokio::test]
    async fn reset_drops_history() {
        let registry = SessionRegistry::new();
        registry
            .get_or_create("abc")
            .await
            .append(&[TranscriptEntry::user("hi")])
            .await;

        assert!(registry.reset("abc").await);
        assert!(!registry.reset("abc").await);
        assert_eq!(registry.get_or_create("abc").await.len().await, 0);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_active() {
        let registry = SessionRegistry::with_limits(Some(2), None);
        registry.get_or_create("a").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.get_or_create("b").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        // "a" becomes the most recent
        registry.get_or_create("a").await;

        registry.get_or_create("c").await;

        assert_eq!(registry.count().await, 2);
        assert!(registry.get("a").await.is_some());
        assert!(registry.get("b").await.is_none());
        assert!(registry.get("c").await.is_some());
    }

    #[tokio::test]
    async fn idle_sessions_expire_on_next_create() {
        let registry = SessionRegistry::with_limits(None, Some(Duration::from_millis(20)));
        registry.get_or_create("stale").await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        registry.get_or_create("fresh").await;

        assert!(registry.get("stale").await.is_none());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn busy_session_is_not_evicted() {
        let registry = SessionRegistry::with_limits(Some(1), Some(Duration::from_millis(1)));
        let busy = registry.get_or_create("busy").await;
        let _turn = busy.begin_turn().await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        registry.get_or_create("other").await;

        assert!(registry.get("busy").await.is_some());
        assert_eq!(registry.count().await, 2);
    }

    #[tokio::test]
    async fn unlimited_registry_keeps_everything() {
        let registry = SessionRegistry::with_limits(Some(0), None);
        for i in 0..50 {
            registry.get_or_create(&format!("s{i}")).await;
        }
        assert_eq!(registry.count().await, 50);
    }
}
