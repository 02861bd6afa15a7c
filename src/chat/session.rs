use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::models::ChatMessage;

/// One conversation's turn history. Mutated only by the single logical turn
/// that owns it; concurrent turns on the same session id require external
/// serialization.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Bounded in-process session storage. Sessions beyond the capacity are
/// evicted least-recently-used; every read or write of a session counts as
/// a use.
pub struct SessionStore {
    sessions: Mutex<LruCache<String, Session>>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        Self {
            sessions: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Snapshot the session's history, creating the session on first touch.
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(session_id) {
            return session.history.clone();
        }
        tracing::info!(session_id, "creating new session");
        sessions.put(session_id.to_string(), Session::new(session_id.to_string()));
        Vec::new()
    }

    /// Record a completed exchange. Called only after the turn succeeded, so
    /// failed turns never pollute history.
    pub fn append_exchange(&self, session_id: &str, question: &str, answer: &str) {
        let mut sessions = self.sessions.lock();
        if !sessions.contains(session_id) {
            // Recreate if the session was evicted mid-turn.
            sessions.put(session_id.to_string(), Session::new(session_id.to_string()));
        }
        if let Some(session) = sessions.get_mut(session_id) {
            session.history.push(ChatMessage::user(question));
            session.history.push(ChatMessage::assistant(answer));
        }
    }

    /// Reset a session's history. Idempotent: clearing an unknown or
    /// already-empty session is a no-op.
    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(session_id) {
            let cleared = session.history.len();
            session.history.clear();
            tracing::info!(session_id, cleared, "session history cleared");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains(session_id)
    }
}
