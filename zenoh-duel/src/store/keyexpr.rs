//! Key expression layout of a session in the zenoh keyspace
//!
//! - `<prefix>/<session>/s/<key>`: session-scoped value
//! - `<prefix>/<session>/m/<member>/<key>`: member-scoped value
//! - `<prefix>/<session>/presence/<member>`: liveliness token of a member
//! - `<prefix>/<session>/host`: liveliness token held by the session creator
//! - `<prefix>/<session>/closed`: liveliness token raised once a member left

use zenoh::key_expr::KeyExpr;

use super::Scope;
use crate::error::{DuelError, Result};
use crate::types::{MemberId, SessionId};

const SESSION_SEGMENT: &str = "s";
const MEMBER_SEGMENT: &str = "m";
const PRESENCE_SEGMENT: &str = "presence";
const HOST_SEGMENT: &str = "host";
const CLOSED_SEGMENT: &str = "closed";

/// A value key parsed back from a received sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKey {
    Session { key: String },
    Member { member: MemberId, key: String },
}

/// All key expressions belonging to one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyspace {
    prefix: String,
    session_id: SessionId,
}

impl SessionKeyspace {
    /// Create the keyspace for a session under a prefix
    pub fn new(prefix: &KeyExpr<'_>, session_id: SessionId) -> Self {
        Self {
            prefix: prefix.to_string(),
            session_id,
        }
    }

    /// Get the session ID
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn root(&self) -> String {
        format!("{}/{}", self.prefix, self.session_id.as_str())
    }

    fn build(s: String) -> Result<KeyExpr<'static>> {
        KeyExpr::try_from(s.clone())
            .map_err(|e| DuelError::InvalidKeyexpr(format!("{}: {}", s, e)))
    }

    /// Keyexpr of a single value
    pub fn value(&self, scope: Scope<'_>, key: &str) -> Result<KeyExpr<'static>> {
        if key.is_empty() || key.contains('/') {
            return Err(DuelError::InvalidKeyexpr(format!(
                "value key '{}' must be a single chunk",
                key
            )));
        }
        match scope {
            Scope::Session => Self::build(format!("{}/{}/{}", self.root(), SESSION_SEGMENT, key)),
            Scope::Member(member) => Self::build(format!(
                "{}/{}/{}/{}",
                self.root(),
                MEMBER_SEGMENT,
                member.as_str(),
                key
            )),
        }
    }

    /// Glob matching every value of the session
    pub fn values_glob(&self) -> Result<KeyExpr<'static>> {
        Self::build(format!("{}/**", self.root()))
    }

    /// Liveliness keyexpr of one member
    pub fn presence(&self, member: &MemberId) -> Result<KeyExpr<'static>> {
        Self::build(format!("{}/{}/{}", self.root(), PRESENCE_SEGMENT, member.as_str()))
    }

    /// Glob matching the liveliness tokens of every member
    pub fn presence_glob(&self) -> Result<KeyExpr<'static>> {
        Self::build(format!("{}/{}/*", self.root(), PRESENCE_SEGMENT))
    }

    /// Liveliness keyexpr announcing that the session exists
    pub fn host(&self) -> Result<KeyExpr<'static>> {
        Self::build(format!("{}/{}", self.root(), HOST_SEGMENT))
    }

    /// Liveliness keyexpr announcing that the session no longer admits members
    pub fn closed(&self) -> Result<KeyExpr<'static>> {
        Self::build(format!("{}/{}", self.root(), CLOSED_SEGMENT))
    }

    fn relative<'a>(&self, keyexpr: &'a str) -> Option<Vec<&'a str>> {
        let root = self.root();
        let rest = keyexpr.strip_prefix(root.as_str())?.strip_prefix('/')?;
        Some(rest.split('/').collect())
    }

    /// Parse a value keyexpr of this session
    pub fn parse_value(&self, keyexpr: &str) -> Option<ValueKey> {
        match self.relative(keyexpr)?.as_slice() {
            [SESSION_SEGMENT, key] => Some(ValueKey::Session {
                key: key.to_string(),
            }),
            [MEMBER_SEGMENT, member, key] => Some(ValueKey::Member {
                member: MemberId::from_name(member.to_string()).ok()?,
                key: key.to_string(),
            }),
            _ => None,
        }
    }

    /// Parse a presence keyexpr of this session into the member it announces
    pub fn parse_presence(&self, keyexpr: &str) -> Option<MemberId> {
        match self.relative(keyexpr)?.as_slice() {
            [PRESENCE_SEGMENT, member] => MemberId::from_name(member.to_string()).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyspace() -> SessionKeyspace {
        let prefix = KeyExpr::try_from("zenoh/duel").unwrap();
        SessionKeyspace::new(&prefix, SessionId::parse("abc123").unwrap())
    }

    fn member(name: &str) -> MemberId {
        MemberId::from_name(name.to_string()).unwrap()
    }

    #[test]
    fn test_session_value_keyexpr() {
        let keyexpr = keyspace().value(Scope::Session, "StartNonce").unwrap();
        assert_eq!(keyexpr.as_str(), "zenoh/duel/abc123/s/StartNonce");
        assert_eq!(
            keyspace().parse_value(keyexpr.as_str()),
            Some(ValueKey::Session {
                key: "StartNonce".to_string()
            })
        );
    }

    #[test]
    fn test_member_value_keyexpr() {
        let guest = member("guest");
        let keyexpr = keyspace().value(Scope::Member(&guest), "LoadedNonce").unwrap();
        assert_eq!(keyexpr.as_str(), "zenoh/duel/abc123/m/guest/LoadedNonce");
        assert_eq!(
            keyspace().parse_value(keyexpr.as_str()),
            Some(ValueKey::Member {
                member: guest,
                key: "LoadedNonce".to_string()
            })
        );
    }

    #[test]
    fn test_presence_keyexpr() {
        let keyexpr = keyspace().presence(&member("host")).unwrap();
        assert_eq!(keyexpr.as_str(), "zenoh/duel/abc123/presence/host");
        assert_eq!(keyspace().parse_presence(keyexpr.as_str()), Some(member("host")));
        assert_eq!(keyspace().presence_glob().unwrap().as_str(), "zenoh/duel/abc123/presence/*");
    }

    #[test]
    fn test_lifecycle_keyexprs() {
        let ks = keyspace();
        assert_eq!(ks.host().unwrap().as_str(), "zenoh/duel/abc123/host");
        assert_eq!(ks.closed().unwrap().as_str(), "zenoh/duel/abc123/closed");
        // Neither is mistaken for a value or a member
        assert_eq!(ks.parse_value("zenoh/duel/abc123/host"), None);
        assert_eq!(ks.parse_presence("zenoh/duel/abc123/closed"), None);
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        let ks = keyspace();
        assert_eq!(ks.parse_value("zenoh/duel/other/s/StartNonce"), None);
        assert_eq!(ks.parse_value("zenoh/duel/abc123/x/StartNonce"), None);
        assert_eq!(ks.parse_value("zenoh/duel/abc123/s/a/b"), None);
        assert_eq!(ks.parse_presence("zenoh/duel/abc123/s/StartNonce"), None);
    }

    #[test]
    fn test_invalid_value_key() {
        assert!(keyspace().value(Scope::Session, "a/b").is_err());
        assert!(keyspace().value(Scope::Session, "").is_err());
    }
}
