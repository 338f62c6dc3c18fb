//! SessionStore: the server-side home of editing sessions

use super::{EditorSession, SessionId};
use crate::graph::Canvas;
use dashmap::DashMap;

/// Holds every live editing session, keyed by id.
///
/// Access goes through closures so a map guard is never held across an
/// `.await`: callers start a request under one guard, call the gateway, and
/// apply the reply under a fresh guard.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, EditorSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create an empty session waiting for an upload
    pub fn create(&self, canvas: Canvas) -> SessionId {
        self.insert(EditorSession::new(canvas))
    }

    /// Add a session, replacing any with the same id
    pub fn insert(&self, session: EditorSession) -> SessionId {
        let id = session.id().clone();
        self.sessions.insert(id.clone(), session);
        id
    }

    /// Run `f` against the session, if it exists
    pub fn with_session<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut EditorSession) -> R,
    ) -> Option<R> {
        self.sessions.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// Drop a session (the user went back to the upload screen)
    pub fn remove(&self, id: &SessionId) -> Option<EditorSession> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Phase;

    #[test]
    fn test_create_store() {
        let store = SessionStore::new();
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_session() {
        let store = SessionStore::new();
        let id = store.create(Canvas::default());

        assert_eq!(store.len(), 1);
        assert!(store.contains(&id));
        let phase = store.with_session(&id, |s| s.phase());
        assert_eq!(phase, Some(Phase::Upload));
    }

    #[test]
    fn test_unknown_session_is_none() {
        let store = SessionStore::new();
        let missing = SessionId::from_string("missing");
        assert!(store.with_session(&missing, |s| s.phase()).is_none());
    }

    #[test]
    fn test_remove_session() {
        let store = SessionStore::new();
        let id = store.create(Canvas::default());

        let removed = store.remove(&id);
        assert!(removed.is_some());
        assert!(store.is_empty());
    }
}
