//! In-process session store
//!
//! All handles connected to one [`MemoryHub`] see the same sessions. Writes
//! are visible immediately and fan out a change event to every member of
//! the session, the writer included. Used by tests and by the local
//! two-peer demo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Scope, SessionStore, StoreEvent, SESSION_CAPACITY};
use crate::error::{DuelError, Result};
use crate::types::{MemberId, SessionId};

#[derive(Debug)]
struct SessionData {
    owner: MemberId,
    members: Vec<MemberId>,
    /// Set once any member leaves; nobody can (re-)enter afterwards
    closed: bool,
    session_values: HashMap<String, String>,
    member_values: HashMap<MemberId, HashMap<String, String>>,
}

#[derive(Debug, Default)]
struct HubInner {
    sessions: HashMap<SessionId, SessionData>,
    inboxes: HashMap<MemberId, Vec<StoreEvent>>,
}

impl HubInner {
    fn notify(&mut self, session_id: &SessionId, event: StoreEvent) {
        let Some(session) = self.sessions.get(session_id) else {
            return;
        };
        for member in &session.members {
            if let Some(inbox) = self.inboxes.get_mut(member) {
                inbox.push(event.clone());
            }
        }
    }

    fn push(&mut self, member: &MemberId, event: StoreEvent) {
        if let Some(inbox) = self.inboxes.get_mut(member) {
            inbox.push(event);
        }
    }
}

/// Shared backing state for a set of [`MemoryStore`] handles
#[derive(Debug, Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
    capacity: usize,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    /// Create a hub whose sessions hold two members
    pub fn new() -> Self {
        Self::with_capacity(SESSION_CAPACITY)
    }

    /// Create a hub whose sessions hold up to `capacity` members
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner::default())),
            capacity,
        }
    }

    /// Connect a new peer to the hub
    pub fn connect(&self, id: MemberId) -> MemoryStore {
        self.lock().inboxes.entry(id.clone()).or_default();
        MemoryStore {
            hub: self.clone(),
            id,
            session: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One peer's handle onto a [`MemoryHub`]
#[derive(Debug)]
pub struct MemoryStore {
    hub: MemoryHub,
    id: MemberId,
    session: Mutex<Option<SessionId>>,
}

impl MemoryStore {
    fn session_id(&self) -> Option<SessionId> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session_id(&self, id: Option<SessionId>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }
}

impl SessionStore for MemoryStore {
    fn is_available(&self) -> bool {
        true
    }

    fn local_id(&self) -> Option<&MemberId> {
        Some(&self.id)
    }

    fn create_session(&self) -> Result<SessionId> {
        if let Some(current) = self.session_id() {
            return Err(DuelError::AlreadyInSession(current.to_string()));
        }
        let session_id = SessionId::generate();
        let mut inner = self.hub.lock();
        inner.sessions.insert(
            session_id.clone(),
            SessionData {
                owner: self.id.clone(),
                members: vec![self.id.clone()],
                closed: false,
                session_values: HashMap::new(),
                member_values: HashMap::new(),
            },
        );
        inner.push(&self.id, StoreEvent::SessionStateChanged);
        drop(inner);

        self.set_session_id(Some(session_id.clone()));
        tracing::debug!("Memory store '{}' created session '{}'", self.id, session_id);
        Ok(session_id)
    }

    fn join_session(&self, id: &SessionId) -> Result<()> {
        if let Some(current) = self.session_id() {
            return Err(DuelError::AlreadyInSession(current.to_string()));
        }
        let mut inner = self.hub.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| DuelError::SessionNotFound(id.to_string()))?;
        if session.closed {
            return Err(DuelError::SessionClosed(id.to_string()));
        }
        if session.members.len() >= self.hub.capacity {
            return Err(DuelError::SessionFull(id.to_string()));
        }
        session.members.push(self.id.clone());
        inner.notify(id, StoreEvent::MembersChanged);
        inner.push(&self.id, StoreEvent::SessionStateChanged);
        drop(inner);

        self.set_session_id(Some(id.clone()));
        tracing::debug!("Memory store '{}' joined session '{}'", self.id, id);
        Ok(())
    }

    fn leave_session(&self) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        let mut inner = self.hub.lock();
        let now_empty = match inner.sessions.get_mut(&session_id) {
            Some(session) => {
                session.members.retain(|m| m != &self.id);
                session.member_values.remove(&self.id);
                session.closed = true;
                session.members.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.sessions.remove(&session_id);
        } else {
            inner.notify(&session_id, StoreEvent::MembersChanged);
        }
        inner.push(&self.id, StoreEvent::SessionStateChanged);
        drop(inner);

        self.set_session_id(None);
        tracing::debug!("Memory store '{}' left session '{}'", self.id, session_id);
    }

    fn current_session(&self) -> Option<SessionId> {
        self.session_id()
    }

    fn set_value(&self, scope: Scope<'_>, key: &str, value: &str) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        let mut inner = self.hub.lock();
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return;
        };
        let values = match scope {
            Scope::Session => &mut session.session_values,
            Scope::Member(member) => {
                if !session.members.contains(member) {
                    return;
                }
                session.member_values.entry(member.clone()).or_default()
            }
        };
        values.insert(key.to_string(), value.to_string());
        inner.notify(&session_id, StoreEvent::ValuesChanged);
    }

    fn get_value(&self, scope: Scope<'_>, key: &str) -> Option<String> {
        let session_id = self.session_id()?;
        let inner = self.hub.lock();
        let session = inner.sessions.get(&session_id)?;
        match scope {
            Scope::Session => session.session_values.get(key).cloned(),
            Scope::Member(member) => session.member_values.get(member)?.get(key).cloned(),
        }
    }

    fn members(&self) -> Vec<MemberId> {
        let Some(session_id) = self.session_id() else {
            return Vec::new();
        };
        self.hub
            .lock()
            .sessions
            .get(&session_id)
            .map(|s| s.members.clone())
            .unwrap_or_default()
    }

    fn owner(&self) -> Option<MemberId> {
        let session_id = self.session_id()?;
        self.hub
            .lock()
            .sessions
            .get(&session_id)
            .map(|s| s.owner.clone())
    }

    fn drain_events(&self) -> Vec<StoreEvent> {
        self.hub
            .lock()
            .inboxes
            .get_mut(&self.id)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> MemberId {
        MemberId::from_name(name.to_string()).unwrap()
    }

    #[test]
    fn test_create_and_join() {
        let hub = MemoryHub::new();
        let host = hub.connect(member("host"));
        let guest = hub.connect(member("guest"));

        let session_id = host.create_session().unwrap();
        guest.join_session(&session_id).unwrap();

        assert_eq!(host.members(), vec![member("host"), member("guest")]);
        assert_eq!(guest.owner(), Some(member("host")));
        assert_eq!(guest.current_session(), Some(session_id));
    }

    #[test]
    fn test_values_are_shared_and_scoped() {
        let hub = MemoryHub::new();
        let host = hub.connect(member("host"));
        let guest = hub.connect(member("guest"));
        let session_id = host.create_session().unwrap();
        guest.join_session(&session_id).unwrap();

        host.set_value(Scope::Session, "StartNonce", "1");
        guest.set_value(Scope::Member(&member("guest")), "Ready", "1");

        assert_eq!(guest.get_value(Scope::Session, "StartNonce").as_deref(), Some("1"));
        assert_eq!(
            host.get_value(Scope::Member(&member("guest")), "Ready").as_deref(),
            Some("1")
        );
        assert_eq!(host.get_value(Scope::Member(&member("host")), "Ready"), None);
    }

    #[test]
    fn test_writes_notify_every_member() {
        let hub = MemoryHub::new();
        let host = hub.connect(member("host"));
        let guest = hub.connect(member("guest"));
        let session_id = host.create_session().unwrap();
        guest.join_session(&session_id).unwrap();
        host.drain_events();
        guest.drain_events();

        host.set_value(Scope::Session, "BeginNonce", "1");

        assert_eq!(host.drain_events(), vec![StoreEvent::ValuesChanged]);
        assert_eq!(guest.drain_events(), vec![StoreEvent::ValuesChanged]);
        assert!(guest.drain_events().is_empty());
    }

    #[test]
    fn test_session_closes_after_leave() {
        let hub = MemoryHub::new();
        let host = hub.connect(member("host"));
        let guest = hub.connect(member("guest"));
        let session_id = host.create_session().unwrap();
        guest.join_session(&session_id).unwrap();
        host.drain_events();

        guest.leave_session();

        assert_eq!(host.members(), vec![member("host")]);
        assert!(host.drain_events().contains(&StoreEvent::MembersChanged));
        assert!(guest.current_session().is_none());
        assert!(matches!(
            guest.join_session(&session_id),
            Err(DuelError::SessionClosed(_))
        ));
    }

    #[test]
    fn test_remaining_guest_keeps_session_after_host_leaves() {
        let hub = MemoryHub::new();
        let host = hub.connect(member("host"));
        let guest = hub.connect(member("guest"));
        let session_id = host.create_session().unwrap();
        guest.join_session(&session_id).unwrap();
        host.set_value(Scope::Session, "RolesNonce", "1");

        host.leave_session();

        assert_eq!(guest.members(), vec![member("guest")]);
        assert_eq!(guest.get_value(Scope::Session, "RolesNonce").as_deref(), Some("1"));

        guest.leave_session();
        assert!(matches!(
            hub.connect(member("late")).join_session(&session_id),
            Err(DuelError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let hub = MemoryHub::new();
        let host = hub.connect(member("host"));
        let session_id = host.create_session().unwrap();
        hub.connect(member("guest")).join_session(&session_id).unwrap();

        let result = hub.connect(member("third")).join_session(&session_id);
        assert!(matches!(result, Err(DuelError::SessionFull(_))));
    }

    #[test]
    fn test_not_in_session_reads_empty() {
        let hub = MemoryHub::new();
        let loner = hub.connect(member("loner"));
        loner.set_value(Scope::Session, "StartNonce", "5");
        assert_eq!(loner.get_value(Scope::Session, "StartNonce"), None);
        assert!(loner.members().is_empty());
        assert!(loner.owner().is_none());
    }
}
