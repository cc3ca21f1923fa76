//! Session registry
//!
//! Tracks the recording sessions that are currently active, bounded by the
//! configured maximum. Registration is best effort: a session that does not
//! fit is reported and keeps working untracked, nothing is evicted or queued.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::session::{RecordingSession, SessionId};

/// Concurrent sessions in the observed deployment (one per mentor)
pub const DEFAULT_MAX_SESSIONS: usize = 40;

pub struct SessionRegistry {
    capacity: usize,
    /// Active recording sessions (session_id → session)
    sessions: RwLock<HashMap<SessionId, Arc<RecordingSession>>>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        info!("Session registry initialized (capacity {})", capacity);

        Self {
            capacity,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Track a session if there is room
    ///
    /// Registering an id that is already present is a no-op.
    pub fn register(&self, session: Arc<RecordingSession>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write();

        if sessions.contains_key(session.id()) {
            debug!("Session {} already registered", session.id());
            return Ok(());
        }

        if sessions.len() >= self.capacity {
            warn!(
                "Maximum concurrent sessions reached ({}); {} continues untracked",
                self.capacity,
                session.id()
            );
            return Err(RegistryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        debug!(
            "Registered session {} ({}/{})",
            session.id(),
            sessions.len() + 1,
            self.capacity
        );
        sessions.insert(session.id().clone(), session);
        Ok(())
    }

    /// Stop tracking a session; unknown ids are ignored
    pub fn unregister(&self, id: &SessionId) -> Option<Arc<RecordingSession>> {
        let removed = self.sessions.write().remove(id);
        if removed.is_some() {
            debug!("Unregistered session {}", id);
        }
        removed
    }

    /// Number of active sessions
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<RecordingSession>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Ids of all active sessions, in no particular order
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().cloned().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ToneCaptureAdapter, ToneConfig};
    use crate::session::SessionConfig;

    fn session() -> Arc<RecordingSession> {
        let adapter = Arc::new(ToneCaptureAdapter::new(ToneConfig::default()));
        Arc::new(RecordingSession::new(
            SessionId::generate(),
            adapter,
            SessionConfig::default(),
        ))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SessionRegistry::new(2);
        let s = session();

        registry.register(Arc::clone(&s)).unwrap();
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(s.id()));
        assert!(Arc::ptr_eq(&registry.get(s.id()).unwrap(), &s));
    }

    #[test]
    fn test_capacity_is_enforced_without_eviction() {
        let registry = SessionRegistry::new(2);
        let first = session();
        let second = session();
        let third = session();

        registry.register(Arc::clone(&first)).unwrap();
        registry.register(Arc::clone(&second)).unwrap();

        let err = registry.register(Arc::clone(&third)).unwrap_err();
        assert_eq!(err, RegistryError::CapacityExceeded { capacity: 2 });
        assert_eq!(registry.count(), 2);
        assert!(registry.contains(first.id()));
        assert!(registry.contains(second.id()));
        assert!(!registry.contains(third.id()));
        assert!(registry.is_full());
    }

    #[test]
    fn test_duplicate_register_is_noop() {
        let registry = SessionRegistry::new(1);
        let s = session();

        registry.register(Arc::clone(&s)).unwrap();
        registry.register(Arc::clone(&s)).unwrap();
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry = SessionRegistry::default();
        assert!(registry.unregister(&SessionId::from("missing")).is_none());
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.capacity(), DEFAULT_MAX_SESSIONS);
    }

    #[test]
    fn test_unregister_frees_a_slot() {
        let registry = SessionRegistry::new(1);
        let first = session();
        let second = session();

        registry.register(Arc::clone(&first)).unwrap();
        assert!(registry.register(Arc::clone(&second)).is_err());

        registry.unregister(first.id());
        registry.register(Arc::clone(&second)).unwrap();
        assert_eq!(registry.ids(), vec![second.id().clone()]);
    }
}
