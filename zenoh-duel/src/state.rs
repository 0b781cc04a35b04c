//! Typed view over the session store
//!
//! Every getter tolerates missing or malformed values: nonces read as `0`,
//! flags as `false`, names as empty. Peers routinely observe state mid-update,
//! so none of this is an error.
//!
//! Write ownership:
//! - role table, start/begin/end records: host only
//! - ready and loaded markers, display name: each member for itself
//!
//! Host-only operations called by a guest, and any operation called outside
//! a session, do nothing and report it through their return value
//! (`0` or `false`).

use crate::store::{Scope, SessionStore};
use crate::types::{MemberId, PlayerInfo, Role, StartRequest, Winner};

/// Store keys
pub mod keys {
    pub const HOST_ROLE: &str = "HostRole";
    pub const GUEST_ROLE: &str = "GuestRole";
    pub const ROLES_NONCE: &str = "RolesNonce";
    pub const START_NONCE: &str = "StartNonce";
    pub const MAP_ID: &str = "MapId";
    pub const DAY_PARAMETER: &str = "DayParam";
    pub const BEGIN_NONCE: &str = "BeginNonce";
    pub const GAME_END_NONCE: &str = "GameEndNonce";
    pub const WINNER: &str = "Winner";

    pub const NAME: &str = "Name";
    pub const READY: &str = "Ready";
    pub const READY_ROLES_NONCE: &str = "ReadyRolesNonce";
    pub const LOADED_NONCE: &str = "LoadedNonce";
}

/// Fewest members needed to start and to pass the load barrier
pub const MIN_MEMBERS: usize = 2;

fn parse_nonce(key: &str, raw: Option<String>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::debug!("Malformed nonce '{}' for '{}', reading 0", raw, key);
            0
        }
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(raw.as_deref().map(str::trim), Some("1") | Some("true"))
}

/// Typed, permission-checked access to the shared session state
#[derive(Debug)]
pub struct SessionState<S> {
    store: S,
}

impl<S: SessionStore> SessionState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get reference to the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the store is up and the local member is in a session
    pub fn in_session(&self) -> bool {
        self.store.is_available() && self.store.current_session().is_some()
    }

    /// The local member, when in a session
    pub fn local_id(&self) -> Option<MemberId> {
        if !self.in_session() {
            return None;
        }
        self.store.local_id().cloned()
    }

    /// Whether the local member owns the session
    pub fn is_host(&self) -> bool {
        match (self.local_id(), self.store.owner()) {
            (Some(local), Some(owner)) => local == owner,
            _ => false,
        }
    }

    fn host_local_id(&self, operation: &str) -> Option<MemberId> {
        if !self.in_session() {
            tracing::debug!("{} ignored: not in a session", operation);
            return None;
        }
        if !self.is_host() {
            tracing::warn!("{} rejected: local member is not the host", operation);
            return None;
        }
        self.local_id()
    }

    pub fn members(&self) -> Vec<MemberId> {
        if !self.in_session() {
            return Vec::new();
        }
        self.store.members()
    }

    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    fn session_nonce(&self, key: &str) -> u64 {
        parse_nonce(key, self.store.get_value(Scope::Session, key))
    }

    fn member_nonce(&self, member: &MemberId, key: &str) -> u64 {
        parse_nonce(key, self.store.get_value(Scope::Member(member), key))
    }

    pub fn roles_nonce(&self) -> u64 {
        self.session_nonce(keys::ROLES_NONCE)
    }

    pub fn start_nonce(&self) -> u64 {
        self.session_nonce(keys::START_NONCE)
    }

    pub fn begin_nonce(&self) -> u64 {
        self.session_nonce(keys::BEGIN_NONCE)
    }

    pub fn game_end_nonce(&self) -> u64 {
        self.session_nonce(keys::GAME_END_NONCE)
    }

    /// Current start request, if the host ever issued one
    pub fn start_request(&self) -> Option<StartRequest> {
        let start_nonce = self.start_nonce();
        if start_nonce == 0 {
            return None;
        }
        Some(StartRequest {
            start_nonce,
            map_id: self.session_nonce(keys::MAP_ID),
            day: self.session_nonce(keys::DAY_PARAMETER),
        })
    }

    /// Role held by the host (Rabbit until the table is replicated)
    pub fn host_role(&self) -> Role {
        self.store
            .get_value(Scope::Session, keys::HOST_ROLE)
            .and_then(|token| Role::from_token(&token))
            .unwrap_or(Role::Rabbit)
    }

    /// Role held by the guest; always the complement of the host role
    pub fn guest_role(&self) -> Role {
        let host = self.host_role();
        match self
            .store
            .get_value(Scope::Session, keys::GUEST_ROLE)
            .and_then(|token| Role::from_token(&token))
        {
            Some(role) if role != host => role,
            _ => host.other(),
        }
    }

    pub fn role_of(&self, member: &MemberId) -> Role {
        if self.store.owner().as_ref() == Some(member) {
            self.host_role()
        } else {
            self.guest_role()
        }
    }

    /// Role of the local member, when in a session
    pub fn local_role(&self) -> Option<Role> {
        self.local_id().map(|id| self.role_of(&id))
    }

    /// Publish the local member's display name
    pub fn write_display_name(&self, name: &str) -> bool {
        let Some(local) = self.local_id() else {
            return false;
        };
        self.store.set_value(Scope::Member(&local), keys::NAME, name);
        true
    }

    pub fn display_name(&self, member: &MemberId) -> String {
        self.store
            .get_value(Scope::Member(member), keys::NAME)
            .unwrap_or_default()
    }

    /// Host: install the initial role table (host Rabbit, guest Mole)
    pub fn assign_default_roles(&self) -> bool {
        if self.host_local_id("AssignDefaultRoles").is_none() {
            return false;
        }
        self.store
            .set_value(Scope::Session, keys::HOST_ROLE, Role::Rabbit.token());
        self.store
            .set_value(Scope::Session, keys::GUEST_ROLE, Role::Mole.token());
        self.store.set_value(Scope::Session, keys::ROLES_NONCE, "1");
        tracing::info!("Default roles assigned (host {}, guest {})", Role::Rabbit, Role::Mole);
        true
    }

    /// Host: exchange the two roles
    ///
    /// Bumping RolesNonce makes every outstanding ready vote stale. Returns
    /// the new RolesNonce, or 0 when rejected.
    pub fn swap_roles(&self) -> u64 {
        if self.host_local_id("SwapRoles").is_none() {
            return 0;
        }
        let new_host = self.guest_role();
        let new_guest = self.host_role();
        let next = self.roles_nonce() + 1;
        self.store
            .set_value(Scope::Session, keys::HOST_ROLE, new_host.token());
        self.store
            .set_value(Scope::Session, keys::GUEST_ROLE, new_guest.token());
        self.store
            .set_value(Scope::Session, keys::ROLES_NONCE, &next.to_string());
        tracing::info!("Roles swapped (host {}, guest {}), RolesNonce {}", new_host, new_guest, next);
        next
    }

    /// Any member: set the local ready vote
    ///
    /// A true vote is stamped with the current RolesNonce.
    pub fn set_ready(&self, ready: bool) -> bool {
        let Some(local) = self.local_id() else {
            tracing::debug!("SetReady ignored: not in a session");
            return false;
        };
        let stamp = if ready { self.roles_nonce() } else { 0 };
        self.store.set_value(
            Scope::Member(&local),
            keys::READY_ROLES_NONCE,
            &stamp.to_string(),
        );
        self.store
            .set_value(Scope::Member(&local), keys::READY, if ready { "1" } else { "0" });
        tracing::debug!("Member '{}' ready={} (RolesNonce {})", local, ready, stamp);
        true
    }

    /// Raw ready flag, regardless of which role table it was given for
    pub fn ready_flag(&self, member: &MemberId) -> bool {
        parse_flag(self.store.get_value(Scope::Member(member), keys::READY))
    }

    /// Ready vote that is valid for the current role table
    pub fn is_effectively_ready(&self, member: &MemberId) -> bool {
        let roles_nonce = self.roles_nonce();
        roles_nonce != 0
            && self.ready_flag(member)
            && self.member_nonce(member, keys::READY_ROLES_NONCE) == roles_nonce
    }

    /// Whether at least one non-host member is effectively ready
    pub fn can_host_start(&self) -> bool {
        let owner = self.store.owner();
        self.members()
            .iter()
            .filter(|m| Some(*m) != owner.as_ref())
            .any(|m| self.is_effectively_ready(m))
    }

    /// Host: open a new round
    ///
    /// Needs at least two members. Writes map and day, clears the begin
    /// signal and the host's own loaded marker, then publishes the new
    /// StartNonce last. Loaded markers of other members are left to their
    /// owners: a marker from an older round can never equal the new nonce.
    /// Returns the new StartNonce, or 0 when rejected.
    pub fn request_start(&self, map_id: u64, day: u64) -> u64 {
        let Some(local) = self.host_local_id("RequestStart") else {
            return 0;
        };
        let count = self.member_count();
        if count < MIN_MEMBERS {
            tracing::warn!("RequestStart rejected: {} member(s) in session", count);
            return 0;
        }
        let next = self.start_nonce() + 1;
        self.store
            .set_value(Scope::Session, keys::MAP_ID, &map_id.to_string());
        self.store
            .set_value(Scope::Session, keys::DAY_PARAMETER, &day.to_string());
        self.store.set_value(Scope::Session, keys::BEGIN_NONCE, "0");
        self.store
            .set_value(Scope::Member(&local), keys::LOADED_NONCE, "0");
        self.store
            .set_value(Scope::Session, keys::START_NONCE, &next.to_string());
        tracing::info!("Start requested: round {} (map {}, day {})", next, map_id, day);
        next
    }

    /// Any member: report the scene for `start_nonce` as loaded
    ///
    /// Each member is the only writer of its own marker, which is why
    /// `request_start` resets just the host's. StartNonce only grows, so a
    /// marker left from an older round never equals the round being opened.
    /// Writing 0 withdraws the marker.
    pub fn mark_loaded(&self, start_nonce: u64) -> bool {
        let Some(local) = self.local_id() else {
            tracing::debug!("MarkLoaded ignored: not in a session");
            return false;
        };
        self.store.set_value(
            Scope::Member(&local),
            keys::LOADED_NONCE,
            &start_nonce.to_string(),
        );
        tracing::debug!("Member '{}' loaded round {}", local, start_nonce);
        true
    }

    pub fn loaded_nonce(&self, member: &MemberId) -> u64 {
        self.member_nonce(member, keys::LOADED_NONCE)
    }

    /// Whether every current member has loaded round `start_nonce`
    pub fn all_members_loaded_for(&self, start_nonce: u64) -> bool {
        if start_nonce == 0 {
            return false;
        }
        let members = self.members();
        members.len() >= MIN_MEMBERS
            && members
                .iter()
                .all(|m| self.loaded_nonce(m) == start_nonce)
    }

    /// Host: release every peer into round `start_nonce`
    ///
    /// Idempotent; returns true only when this call wrote the signal.
    pub fn signal_begin(&self, start_nonce: u64) -> bool {
        if self.host_local_id("SignalBegin").is_none() || start_nonce == 0 {
            return false;
        }
        if self.begin_nonce() == start_nonce {
            return false;
        }
        self.store
            .set_value(Scope::Session, keys::BEGIN_NONCE, &start_nonce.to_string());
        tracing::info!("Begin signalled for round {}", start_nonce);
        true
    }

    /// Host: publish the result of the finished game
    ///
    /// Returns the new GameEndNonce, or 0 when rejected.
    pub fn publish_end(&self, winner: Winner) -> u64 {
        if self.host_local_id("PublishEnd").is_none() {
            return 0;
        }
        let next = self.game_end_nonce() + 1;
        self.store
            .set_value(Scope::Session, keys::WINNER, winner.token());
        self.store
            .set_value(Scope::Session, keys::GAME_END_NONCE, &next.to_string());
        tracing::info!("Game end published: {} (GameEndNonce {})", winner, next);
        next
    }

    /// Latest published end record as `(GameEndNonce, winner)`
    pub fn try_read_end(&self) -> (u64, Winner) {
        let nonce = self.game_end_nonce();
        let winner = self
            .store
            .get_value(Scope::Session, keys::WINNER)
            .map(|token| Winner::from_token(&token))
            .unwrap_or_default();
        (nonce, winner)
    }

    /// Lobby snapshot of every member
    pub fn players(&self) -> Vec<PlayerInfo> {
        let owner = self.store.owner();
        self.members()
            .into_iter()
            .map(|id| PlayerInfo {
                name: self.display_name(&id),
                role: self.role_of(&id),
                ready: self.is_effectively_ready(&id),
                is_host: owner.as_ref() == Some(&id),
                id,
            })
            .collect()
    }
}
