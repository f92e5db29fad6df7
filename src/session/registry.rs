//! Explicit map from session id to session.
//!
//! Owned by whatever component coordinates several scans (the HTTP
//! server, a test). Sessions in one registry never interact.

use super::ScanSession;
use crate::config::ScanConfig;
use crate::error::{SessionError, SessionResult};
use crate::types::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<ScanSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending session and register it.
    pub fn create(&self, config: ScanConfig) -> Arc<ScanSession> {
        let session = Arc::new(ScanSession::new(config));
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id(), Arc::clone(&session));
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<ScanSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Look a session up by full id or by an unambiguous id prefix.
    pub fn find(&self, id_or_prefix: &str) -> SessionResult<Arc<ScanSession>> {
        if let Ok(id) = id_or_prefix.parse::<SessionId>() {
            return self
                .get(&id)
                .ok_or_else(|| SessionError::NotFound(id_or_prefix.to_string()));
        }

        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches = sessions
            .iter()
            .filter(|(id, _)| id.matches_prefix(id_or_prefix))
            .map(|(_, s)| s);

        match (matches.next(), matches.next()) {
            (Some(session), None) => Ok(Arc::clone(session)),
            _ => Err(SessionError::NotFound(id_or_prefix.to_string())),
        }
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<Arc<ScanSession>> {
        let mut sessions: Vec<_> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at());
        sessions
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<ScanSession>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Drop every session that has reached a terminal state.
    pub fn prune_finished(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| !s.status().is_terminal());
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundsPolicy;
    use crate::session::SessionStatus;
    use crate::types::PortSelection;

    fn config() -> ScanConfig {
        ScanConfig::from_input(
            "127.0.0.1",
            &PortSelection::Expression("22".into()),
            1,
            1.0,
            BoundsPolicy::Reject,
        )
        .unwrap()
    }

    #[test]
    fn test_create_get_remove() {
        let registry = SessionRegistry::new();
        let session = registry.create(config());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&session.id()).is_some());

        let removed = registry.remove(&session.id()).unwrap();
        assert_eq!(removed.id(), session.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_prefix() {
        let registry = SessionRegistry::new();
        let session = registry.create(config());

        let found = registry.find(&session.id().short()).unwrap();
        assert_eq!(found.id(), session.id());
        assert_eq!(registry.find(&session.id().to_string()).unwrap().id(), session.id());
        assert!(matches!(registry.find("zzzz"), Err(SessionError::NotFound(_))));
        assert!(registry.find("").is_err());
    }

    #[test]
    fn test_sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.create(config());
        let b = registry.create(config());

        a.request_cancel();
        assert_eq!(a.status(), SessionStatus::Cancelled);
        assert_eq!(b.status(), SessionStatus::Pending);

        assert_eq!(registry.list().len(), 2);
        assert_eq!(registry.prune_finished(), 1);
        assert!(registry.get(&b.id()).is_some());
    }
}
