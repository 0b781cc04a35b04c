//! Session store replicated over zenoh
//!
//! ## Replication
//!
//! Every write is a plain `put` on the value's keyexpr (see
//! [`SessionKeyspace`]). Each peer subscribes to the whole session keyspace
//! and folds received samples into a local replica, so reads never touch
//! the network.
//!
//! Presence is a liveliness token per member; the liveliness subscriber is
//! declared with history so a joining peer learns about members that were
//! already there.
//!
//! Every key has exactly one writer. A late joiner therefore converges by
//! having every peer republish its own keys when it sees a new member
//! appear; no query round trip is needed.
//!
//! ## Session lifecycle
//!
//! The creator holds a `host` liveliness token for as long as it stays in
//! the session. Once any member disappears, every remaining member raises a
//! `closed` token. A join queries these tokens and the presence tokens
//! first, and is refused when the session is unknown, closed or full. The
//! check is a snapshot: two peers joining at the same instant can both pass
//! it.
//!
//! The store uses zenoh's synchronous `wait()` API. Inside a tokio runtime
//! it must run on a multi-threaded runtime.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use zenoh::key_expr::KeyExpr;
use zenoh::liveliness::LivelinessToken;
use zenoh::pubsub::Subscriber;
use zenoh::sample::{Sample, SampleKind};
use zenoh::{Resolvable, Wait};

use super::keyexpr::{SessionKeyspace, ValueKey};
use super::{Scope, SessionStore, StoreEvent, SESSION_CAPACITY};
use crate::error::{DuelError, Result};
use crate::types::{MemberId, SessionId};

/// Keyexpr prefix used when the builder is not given one
pub const DEFAULT_PREFIX: &str = "zenoh/duel";

/// Session key carrying the owner's member id
const OWNER_KEY: &str = "owner";

/// How long a join waits for liveliness replies
const LIVELINESS_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Replica {
    session_values: HashMap<String, String>,
    member_values: HashMap<MemberId, HashMap<String, String>>,
    /// Members with a live presence token, in the order they were seen
    members: Vec<MemberId>,
}

impl Replica {
    fn apply_value(&mut self, key: ValueKey, value: Option<String>) {
        let (values, key) = match key {
            ValueKey::Session { key } => (&mut self.session_values, key),
            ValueKey::Member { member, key } => (self.member_values.entry(member).or_default(), key),
        };
        match value {
            Some(value) => {
                values.insert(key, value);
            }
            None => {
                values.remove(&key);
            }
        }
    }
}

/// Resources held while the local member is in a session
struct Joined {
    keyspace: SessionKeyspace,
    replica: Arc<Mutex<Replica>>,
    /// Values written by this peer, keyed by keyexpr, for republishing
    own_values: HashMap<String, String>,
    _token: LivelinessToken,
    /// Held by the creator only
    _host_token: Option<LivelinessToken>,
    closed_token: Option<LivelinessToken>,
    _values_subscriber: Subscriber<()>,
    _presence_subscriber: Subscriber<()>,
}

/// [`SessionStore`] backed by a zenoh session
pub struct ZenohStore {
    session: zenoh::Session,
    prefix: KeyExpr<'static>,
    id: MemberId,
    joined: Mutex<Option<Joined>>,
    events_tx: flume::Sender<StoreEvent>,
    events_rx: flume::Receiver<StoreEvent>,
    /// Raised by the presence callback when another member appears
    republish: Arc<AtomicBool>,
    /// Raised by the presence callback when a member disappears
    member_left: Arc<AtomicBool>,
    /// Sessions this member already left; they cannot be re-entered
    left: Mutex<HashSet<SessionId>>,
}

impl std::fmt::Debug for ZenohStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenohStore")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("session", &self.current_session())
            .finish()
    }
}

impl ZenohStore {
    fn new(session: zenoh::Session, prefix: KeyExpr<'static>, id: MemberId) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        tracing::info!("Zenoh store for member '{}' under '{}'", id, prefix);
        Self {
            session,
            prefix,
            id,
            joined: Mutex::new(None),
            events_tx,
            events_rx,
            republish: Arc::new(AtomicBool::new(false)),
            member_left: Arc::new(AtomicBool::new(false)),
            left: Mutex::new(HashSet::new()),
        }
    }

    /// Get reference to the zenoh session
    pub fn session(&self) -> &zenoh::Session {
        &self.session
    }

    /// Declare subscribers and the presence token for a session
    fn enter(&self, session_id: SessionId, owner: bool) -> Result<Joined> {
        let keyspace = SessionKeyspace::new(&self.prefix, session_id);
        let replica = Arc::new(Mutex::new(Replica {
            members: vec![self.id.clone()],
            ..Default::default()
        }));

        let values_subscriber = {
            let keyspace = keyspace.clone();
            let replica = replica.clone();
            let events_tx = self.events_tx.clone();
            self.session
                .declare_subscriber(keyspace.values_glob()?)
                .callback(move |sample: Sample| {
                    let Some(key) = keyspace.parse_value(sample.key_expr().as_str()) else {
                        tracing::debug!("Ignoring foreign key '{}'", sample.key_expr());
                        return;
                    };
                    let value = match sample.kind() {
                        SampleKind::Put => match sample.payload().try_to_string() {
                            Ok(text) => Some(text.into_owned()),
                            Err(e) => {
                                tracing::warn!("Non-UTF-8 value on '{}': {}", sample.key_expr(), e);
                                return;
                            }
                        },
                        SampleKind::Delete => None,
                    };
                    lock(&replica).apply_value(key, value);
                    let _ = events_tx.send(StoreEvent::ValuesChanged);
                })
                .wait()?
        };

        let presence_subscriber = {
            let keyspace = keyspace.clone();
            let replica = replica.clone();
            let events_tx = self.events_tx.clone();
            let republish = self.republish.clone();
            let member_left = self.member_left.clone();
            let local_id = self.id.clone();
            self.session
                .liveliness()
                .declare_subscriber(keyspace.presence_glob()?)
                .history(true)
                .callback(move |sample: Sample| {
                    let Some(member) = keyspace.parse_presence(sample.key_expr().as_str()) else {
                        return;
                    };
                    let mut replica = lock(&replica);
                    match sample.kind() {
                        SampleKind::Put => {
                            if replica.members.contains(&member) {
                                return;
                            }
                            tracing::info!("Member '{}' appeared", member);
                            replica.members.push(member.clone());
                            if member != local_id {
                                republish.store(true, Ordering::Release);
                            }
                        }
                        SampleKind::Delete => {
                            if member == local_id || !replica.members.contains(&member) {
                                return;
                            }
                            tracing::info!("Member '{}' disappeared", member);
                            replica.members.retain(|m| m != &member);
                            replica.member_values.remove(&member);
                            member_left.store(true, Ordering::Release);
                        }
                    }
                    drop(replica);
                    let _ = events_tx.send(StoreEvent::MembersChanged);
                })
                .wait()?
        };

        let token = self
            .session
            .liveliness()
            .declare_token(keyspace.presence(&self.id)?)
            .wait()?;
        let host_token = if owner {
            Some(self.session.liveliness().declare_token(keyspace.host()?).wait()?)
        } else {
            None
        };

        Ok(Joined {
            keyspace,
            replica,
            own_values: HashMap::new(),
            _token: token,
            _host_token: host_token,
            closed_token: None,
            _values_subscriber: values_subscriber,
            _presence_subscriber: presence_subscriber,
        })
    }

    /// Keyexprs of the live tokens matching `keyexpr`
    fn live_tokens(&self, keyexpr: KeyExpr<'static>) -> Result<HashSet<String>> {
        let replies = self
            .session
            .liveliness()
            .get(keyexpr)
            .timeout(LIVELINESS_QUERY_TIMEOUT)
            .wait()?;
        let mut tokens = HashSet::new();
        while let Ok(reply) = replies.recv() {
            match reply.result() {
                Ok(sample) => {
                    tokens.insert(sample.key_expr().as_str().to_string());
                }
                Err(e) => tracing::debug!("Liveliness query error: {:?}", e),
            }
        }
        Ok(tokens)
    }

    /// Refuse a join the session cannot take
    fn check_joinable(&self, id: &SessionId) -> Result<()> {
        if lock(&self.left).contains(id) {
            return Err(DuelError::SessionClosed(id.to_string()));
        }
        let keyspace = SessionKeyspace::new(&self.prefix, id.clone());
        if !self.live_tokens(keyspace.closed()?)?.is_empty() {
            return Err(DuelError::SessionClosed(id.to_string()));
        }
        if self.live_tokens(keyspace.host()?)?.is_empty() {
            return Err(DuelError::SessionNotFound(id.to_string()));
        }
        let present = self
            .live_tokens(keyspace.presence_glob()?)?
            .iter()
            .filter_map(|keyexpr| keyspace.parse_presence(keyexpr))
            .filter(|member| member != &self.id)
            .count();
        if present >= SESSION_CAPACITY {
            return Err(DuelError::SessionFull(id.to_string()));
        }
        Ok(())
    }

    /// Announce that the session no longer admits members
    fn close_session(&self) {
        let mut joined = lock(&self.joined);
        let Some(joined) = joined.as_mut() else {
            return;
        };
        if joined.closed_token.is_some() {
            return;
        }
        let token = joined
            .keyspace
            .closed()
            .and_then(|keyexpr| Ok(self.session.liveliness().declare_token(keyexpr).wait()?));
        match token {
            Ok(token) => {
                tracing::info!("Session '{}' closed", joined.keyspace.session_id());
                joined.closed_token = Some(token);
            }
            Err(e) => tracing::warn!("Member '{}' failed to close session: {}", self.id, e),
        }
    }

    fn put(&self, keyexpr: KeyExpr<'static>, value: &str) {
        if let Err(e) = self.session.put(keyexpr.clone(), value.to_string()).wait() {
            tracing::warn!("Member '{}' failed to put '{}': {}", self.id, keyexpr, e);
        }
    }

    fn republish_own_values(&self) {
        let values: Vec<(String, String)> = match lock(&self.joined).as_ref() {
            Some(joined) => joined
                .own_values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => return,
        };
        tracing::debug!("Member '{}' republishing {} value(s)", self.id, values.len());
        for (keyexpr, value) in values {
            match KeyExpr::try_from(keyexpr) {
                Ok(keyexpr) => self.put(keyexpr, &value),
                Err(e) => tracing::warn!("Skipping unparsable keyexpr: {}", e),
            }
        }
    }

    fn with_replica<T>(&self, f: impl FnOnce(&Replica) -> T) -> Option<T> {
        let joined = lock(&self.joined);
        let joined = joined.as_ref()?;
        let replica = lock(&joined.replica);
        Some(f(&replica))
    }
}

impl SessionStore for ZenohStore {
    fn is_available(&self) -> bool {
        true
    }

    fn local_id(&self) -> Option<&MemberId> {
        Some(&self.id)
    }

    fn create_session(&self) -> Result<SessionId> {
        let mut joined = lock(&self.joined);
        if let Some(current) = joined.as_ref() {
            return Err(DuelError::AlreadyInSession(current.keyspace.session_id().to_string()));
        }
        let session_id = SessionId::generate();
        *joined = Some(self.enter(session_id.clone(), true)?);
        drop(joined);

        self.set_value(Scope::Session, OWNER_KEY, self.id.as_str());
        let _ = self.events_tx.send(StoreEvent::SessionStateChanged);
        tracing::info!("Member '{}' created session '{}'", self.id, session_id);
        Ok(session_id)
    }

    fn join_session(&self, id: &SessionId) -> Result<()> {
        let mut joined = lock(&self.joined);
        if let Some(current) = joined.as_ref() {
            return Err(DuelError::AlreadyInSession(current.keyspace.session_id().to_string()));
        }
        self.check_joinable(id)?;
        *joined = Some(self.enter(id.clone(), false)?);
        drop(joined);

        let _ = self.events_tx.send(StoreEvent::SessionStateChanged);
        tracing::info!("Member '{}' joined session '{}'", self.id, id);
        Ok(())
    }

    fn leave_session(&self) {
        // Dropping the token and subscribers undeclares them
        let Some(joined) = lock(&self.joined).take() else {
            return;
        };
        tracing::info!(
            "Member '{}' left session '{}'",
            self.id,
            joined.keyspace.session_id()
        );
        lock(&self.left).insert(joined.keyspace.session_id().clone());
        drop(joined);
        self.republish.store(false, Ordering::Release);
        self.member_left.store(false, Ordering::Release);
        let _ = self.events_tx.send(StoreEvent::SessionStateChanged);
    }

    fn current_session(&self) -> Option<SessionId> {
        lock(&self.joined)
            .as_ref()
            .map(|j| j.keyspace.session_id().clone())
    }

    fn set_value(&self, scope: Scope<'_>, key: &str, value: &str) {
        let keyexpr = {
            let mut joined = lock(&self.joined);
            let Some(joined) = joined.as_mut() else {
                tracing::debug!("Member '{}' not in a session, dropping '{}'", self.id, key);
                return;
            };
            let keyexpr = match joined.keyspace.value(scope, key) {
                Ok(keyexpr) => keyexpr,
                Err(e) => {
                    tracing::warn!("Member '{}' cannot write '{}': {}", self.id, key, e);
                    return;
                }
            };
            let value_key = match scope {
                Scope::Session => ValueKey::Session { key: key.to_string() },
                Scope::Member(member) => ValueKey::Member {
                    member: member.clone(),
                    key: key.to_string(),
                },
            };
            lock(&joined.replica).apply_value(value_key, Some(value.to_string()));
            joined
                .own_values
                .insert(keyexpr.as_str().to_string(), value.to_string());
            keyexpr
        };
        self.put(keyexpr, value);
    }

    fn get_value(&self, scope: Scope<'_>, key: &str) -> Option<String> {
        self.with_replica(|replica| match scope {
            Scope::Session => replica.session_values.get(key).cloned(),
            Scope::Member(member) => replica.member_values.get(member)?.get(key).cloned(),
        })
        .flatten()
    }

    fn members(&self) -> Vec<MemberId> {
        self.with_replica(|replica| replica.members.clone())
            .unwrap_or_default()
    }

    fn owner(&self) -> Option<MemberId> {
        let owner = self.get_value(Scope::Session, OWNER_KEY)?;
        MemberId::from_name(owner).ok()
    }

    fn drain_events(&self) -> Vec<StoreEvent> {
        if self.republish.swap(false, Ordering::AcqRel) {
            self.republish_own_values();
        }
        if self.member_left.swap(false, Ordering::AcqRel) {
            self.close_session();
        }
        self.events_rx.try_iter().collect()
    }
}

/// Extension trait for zenoh::Session to declare a duel store
pub trait SessionExt {
    /// Declare a session store on this zenoh session
    ///
    /// # Example
    /// ```no_run
    /// use zenoh_duel::SessionExt;
    ///
    /// # #[tokio::main(flavor = "multi_thread", worker_threads = 1)]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    /// let session = zenoh::open(zenoh::Config::default()).await?;
    /// let store = session
    ///     .declare_duel_store()
    ///     .member_id("Pipkin_7".to_string())?
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    fn declare_duel_store(&self) -> StoreBuilder<'_>;
}

impl SessionExt for zenoh::Session {
    fn declare_duel_store(&self) -> StoreBuilder<'_> {
        StoreBuilder::new(self)
    }
}

/// Builder for [`ZenohStore`]
#[must_use = "Resolvables do nothing unless you resolve them using `.await` or `zenoh::Wait::wait`"]
pub struct StoreBuilder<'a> {
    session: &'a zenoh::Session,
    member_id: Option<MemberId>,
    prefix: Option<KeyExpr<'static>>,
}

impl<'a> StoreBuilder<'a> {
    fn new(session: &'a zenoh::Session) -> Self {
        Self {
            session,
            member_id: None,
            prefix: None,
        }
    }

    /// Set the member id (generated when not set)
    pub fn member_id(mut self, name: String) -> Result<Self> {
        self.member_id = Some(MemberId::from_name(name)?);
        Ok(self)
    }

    /// Set the key expression prefix
    pub fn prefix(mut self, prefix: KeyExpr<'static>) -> Self {
        self.prefix = Some(prefix);
        self
    }
}

impl Resolvable for StoreBuilder<'_> {
    type To = Result<ZenohStore>;
}

impl Wait for StoreBuilder<'_> {
    fn wait(self) -> Self::To {
        let prefix = match self.prefix {
            Some(prefix) => prefix,
            None => KeyExpr::try_from(DEFAULT_PREFIX)
                .map_err(|e| DuelError::InvalidKeyexpr(e.to_string()))?,
        };
        let id = self.member_id.unwrap_or_else(MemberId::generate);
        Ok(ZenohStore::new(self.session.clone(), prefix, id))
    }
}

impl<'a> std::future::IntoFuture for StoreBuilder<'a> {
    type Output = <Self as Resolvable>::To;
    type IntoFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endgame::EndgameWatcher;
    use crate::state::{keys, SessionState};
    use crate::types::{EndReason, GameOutcome, Role, Winner};

    const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

    async fn open_store(name: &str) -> ZenohStore {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        session
            .declare_duel_store()
            .member_id(name.to_string())
            .unwrap()
            .await
            .unwrap()
    }

    fn store_on(session: &zenoh::Session, name: &str) -> ZenohStore {
        session
            .declare_duel_store()
            .member_id(name.to_string())
            .unwrap()
            .wait()
            .unwrap()
    }

    /// Pump the stores until `done` holds or the timeout passes
    async fn settle(stores: &[&ZenohStore], done: impl Fn() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
        loop {
            for store in stores {
                store.drain_events();
            }
            if done() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[test]
    fn test_replica_applies_and_removes_values() {
        let mut replica = Replica::default();
        let guest = MemberId::from_name("guest".to_string()).unwrap();

        replica.apply_value(
            ValueKey::Member {
                member: guest.clone(),
                key: "Ready".to_string(),
            },
            Some("1".to_string()),
        );
        assert_eq!(replica.member_values[&guest]["Ready"], "1");

        replica.apply_value(
            ValueKey::Member {
                member: guest.clone(),
                key: "Ready".to_string(),
            },
            None,
        );
        assert!(replica.member_values[&guest].get("Ready").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_builder_rejects_invalid_member_id() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let result = session.declare_duel_store().member_id("bad/name".to_string());
        assert!(matches!(result, Err(DuelError::InvalidMemberId(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_create_session_makes_local_member_owner() {
        let store = open_store("zhost").await;
        assert!(store.current_session().is_none());

        let session_id = store.create_session().unwrap();

        assert_eq!(store.current_session(), Some(session_id));
        assert_eq!(store.owner().as_ref(), store.local_id());
        assert!(store.members().contains(&MemberId::from_name("zhost".to_string()).unwrap()));
        assert!(matches!(
            store.create_session(),
            Err(DuelError::AlreadyInSession(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_local_writes_are_readable_immediately() {
        let store = open_store("zwriter").await;
        store.create_session().unwrap();
        let me = store.local_id().cloned().unwrap();

        store.set_value(Scope::Session, "StartNonce", "4");
        store.set_value(Scope::Member(&me), "LoadedNonce", "4");

        assert_eq!(store.get_value(Scope::Session, "StartNonce").as_deref(), Some("4"));
        assert_eq!(store.get_value(Scope::Member(&me), "LoadedNonce").as_deref(), Some("4"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_leave_session_clears_state() {
        let store = open_store("zleaver").await;
        store.create_session().unwrap();
        store.set_value(Scope::Session, "RolesNonce", "1");

        store.leave_session();

        assert!(store.current_session().is_none());
        assert!(store.members().is_empty());
        assert_eq!(store.get_value(Scope::Session, "RolesNonce"), None);
        assert!(store.drain_events().contains(&StoreEvent::SessionStateChanged));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_join_unknown_session_is_rejected() {
        let store = open_store("zstray").await;
        let result = store.join_session(&SessionId::generate());
        assert!(matches!(result, Err(DuelError::SessionNotFound(_))));
        assert!(store.current_session().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_third_member_is_rejected() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let host = store_on(&session, "zfhost");
        let guest = store_on(&session, "zfguest");
        let third = store_on(&session, "zfthird");
        let session_id = host.create_session().unwrap();
        guest.join_session(&session_id).unwrap();

        let result = third.join_session(&session_id);
        assert!(matches!(result, Err(DuelError::SessionFull(_))));
        assert!(third.current_session().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_late_joiner_receives_host_values() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let host = SessionState::new(store_on(&session, "zlhost"));
        let guest = SessionState::new(store_on(&session, "zlguest"));
        let session_id = host.store().create_session().unwrap();
        assert!(host.assign_default_roles());
        assert!(host.write_display_name("Hollin"));

        // Everything above was written before the guest existed
        guest.store().join_session(&session_id).unwrap();
        let host_id = host.local_id().unwrap();
        let converged = settle(&[host.store(), guest.store()], || {
            guest.store().owner().as_ref() == Some(&host_id)
                && guest.roles_nonce() == 1
                && guest.display_name(&host_id) == "Hollin"
                && guest.store().get_value(Scope::Session, keys::GUEST_ROLE).as_deref() == Some("Mole")
                && host.member_count() == 2
        })
        .await;

        assert!(converged);
        assert!(!guest.is_host());
        assert_eq!(guest.local_role(), Some(Role::Mole));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_guest_departure_is_forfeit_and_closes_session() {
        let session = zenoh::open(zenoh::Config::default()).await.unwrap();
        let host = SessionState::new(store_on(&session, "zdhost"));
        let guest = SessionState::new(store_on(&session, "zdguest"));
        let session_id = host.store().create_session().unwrap();
        host.assign_default_roles();
        guest.store().join_session(&session_id).unwrap();
        assert!(settle(&[host.store(), guest.store()], || host.member_count() == 2).await);

        let mut watcher = EndgameWatcher::new();
        watcher.arm(&host);
        assert_eq!(watcher.check(&host), None);

        guest.store().leave_session();
        assert!(settle(&[host.store()], || host.member_count() == 1).await);
        assert_eq!(
            watcher.check(&host),
            Some(GameOutcome {
                winner: Winner::Rabbit,
                reason: EndReason::Forfeit
            })
        );

        // Neither the old guest nor a newcomer can enter again
        assert!(matches!(
            guest.store().join_session(&session_id),
            Err(DuelError::SessionClosed(_))
        ));
        // The departure flag is raised before the member count drops
        host.store().drain_events();
        let newcomer = store_on(&session, "zdlate");
        assert!(matches!(
            newcomer.join_session(&session_id),
            Err(DuelError::SessionClosed(_))
        ));
    }
}
