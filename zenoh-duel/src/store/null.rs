//! Store used when no session platform is available

use super::{Scope, SessionStore, StoreEvent};
use crate::error::{DuelError, Result};
use crate::types::{MemberId, SessionId};

/// A store that is never connected
///
/// Lifecycle calls fail with [`DuelError::StoreUnavailable`]; every other
/// call reads as empty and writes nothing, so the coordination layer keeps
/// running and the UI simply shows "not connected".
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl SessionStore for NullStore {
    fn is_available(&self) -> bool {
        false
    }

    fn local_id(&self) -> Option<&MemberId> {
        None
    }

    fn create_session(&self) -> Result<SessionId> {
        Err(DuelError::StoreUnavailable)
    }

    fn join_session(&self, _id: &SessionId) -> Result<()> {
        Err(DuelError::StoreUnavailable)
    }

    fn leave_session(&self) {}

    fn current_session(&self) -> Option<SessionId> {
        None
    }

    fn set_value(&self, _scope: Scope<'_>, key: &str, _value: &str) {
        tracing::debug!("Null store dropping write to '{}'", key);
    }

    fn get_value(&self, _scope: Scope<'_>, _key: &str) -> Option<String> {
        None
    }

    fn members(&self) -> Vec<MemberId> {
        Vec::new()
    }

    fn owner(&self) -> Option<MemberId> {
        None
    }

    fn drain_events(&self) -> Vec<StoreEvent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_store_is_inert() {
        let store = NullStore;
        assert!(!store.is_available());
        assert!(matches!(store.create_session(), Err(DuelError::StoreUnavailable)));
        assert!(matches!(
            store.join_session(&SessionId::generate()),
            Err(DuelError::StoreUnavailable)
        ));

        store.set_value(Scope::Session, "StartNonce", "3");
        assert_eq!(store.get_value(Scope::Session, "StartNonce"), None);
        assert!(store.members().is_empty());
        assert!(store.owner().is_none());
        assert!(store.drain_events().is_empty());
    }
}
