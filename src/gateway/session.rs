//! Session-scoped key/value storage for CSRF tokens

use dashmap::DashMap;

use crate::types::SessionId;

/// Per-session string storage
///
/// Host applications with their own session backend implement this; the crate
/// ships [`MemorySessionStore`].
pub trait SessionStore: Send + Sync {
    /// Value stored under `key` for `session`
    fn get(&self, session: &SessionId, key: &str) -> Option<String>;

    /// Store a value, returning the one it replaced
    fn insert(&self, session: &SessionId, key: &str, value: String) -> Option<String>;

    /// Remove a value, returning it
    fn remove(&self, session: &SessionId, key: &str) -> Option<String>;
}

/// Process-local session storage
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: DashMap<(SessionId, String), String>,
}

impl MemorySessionStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything stored for a session
    pub fn clear_session(&self, session: &SessionId) {
        self.entries.retain(|(owner, _), _| owner != session);
    }

    /// Number of stored values across all sessions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session: &SessionId, key: &str) -> Option<String> {
        self.entries
            .get(&(session.clone(), key.to_string()))
            .map(|value| value.value().clone())
    }

    fn insert(&self, session: &SessionId, key: &str, value: String) -> Option<String> {
        self.entries
            .insert((session.clone(), key.to_string()), value)
    }

    fn remove(&self, session: &SessionId, key: &str) -> Option<String> {
        self.entries
            .remove(&(session.clone(), key.to_string()))
            .map(|(_, value)| value)
    }
}
