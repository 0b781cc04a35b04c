//! Session store adapters
//!
//! The shared, eventually-consistent key-value store is the only channel
//! between the two peers. Everything above this module talks to it through
//! the [`SessionStore`] trait; which implementation backs it is decided at
//! startup:
//!
//! - [`ZenohStore`] replicates values over a zenoh session
//! - [`MemoryStore`] shares values between handles of one [`MemoryHub`]
//! - [`NullStore`] stands in when no networking is available

pub mod keyexpr;
pub mod memory;
pub mod null;
pub mod zenoh_store;

pub use memory::{MemoryHub, MemoryStore};
pub use null::NullStore;
pub use zenoh_store::{SessionExt, StoreBuilder, ZenohStore};

use crate::error::Result;
use crate::types::{MemberId, SessionId};

/// Members a session admits: the host and one guest
pub const SESSION_CAPACITY: usize = 2;

/// Where a value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Shared by the whole session
    Session,
    /// Attached to one member
    Member(&'a MemberId),
}

/// Change notifications
///
/// Delivered at-least-once: consumers re-read the store on every event and
/// must treat duplicates as no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A member joined or left
    MembersChanged,
    /// Some session or member value changed
    ValuesChanged,
    /// The local peer entered or left a session
    SessionStateChanged,
}

/// Capability interface over the replicated session store
///
/// Reads return the latest locally known snapshot and never block. Writes
/// are fire-and-forget. Values are opaque strings; typing is layered on top
/// by [`SessionState`](crate::SessionState).
pub trait SessionStore {
    /// Whether the underlying platform is initialized
    fn is_available(&self) -> bool;

    /// Identity of the local member
    fn local_id(&self) -> Option<&MemberId>;

    /// Create a new session owned by the local member
    fn create_session(&self) -> Result<SessionId>;

    /// Join an existing session
    fn join_session(&self, id: &SessionId) -> Result<()>;

    /// Leave the current session (no-op when not in one)
    fn leave_session(&self);

    /// Session the local member is in, if any
    fn current_session(&self) -> Option<SessionId>;

    /// Write a value
    fn set_value(&self, scope: Scope<'_>, key: &str, value: &str);

    /// Read a value; None when missing or not in a session
    fn get_value(&self, scope: Scope<'_>, key: &str) -> Option<String>;

    /// Current members, in join order when the backend knows it
    fn members(&self) -> Vec<MemberId>;

    /// Session owner (the host)
    fn owner(&self) -> Option<MemberId>;

    /// Take all change notifications received since the last call
    fn drain_events(&self) -> Vec<StoreEvent>;
}
