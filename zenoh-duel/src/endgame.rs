//! Terminal conditions of a running game
//!
//! Two triggers, checked in priority order on every tick:
//!
//! 1. Disconnect: membership drops to exactly one after having been full.
//!    The remaining peer wins; the peer that left cannot take part in any
//!    further protocol step.
//! 2. Published result (guests only): the host bumped GameEndNonce past the
//!    last value this peer applied.
//!
//! Only the host writes the end record, so the two peers never race to
//! publish conflicting results.

use crate::state::{SessionState, MIN_MEMBERS};
use crate::store::SessionStore;
use crate::types::{EndReason, GameOutcome, Role, Winner};

#[derive(Debug, Default)]
pub struct EndgameWatcher {
    active: bool,
    ended: bool,
    /// Membership reached MIN_MEMBERS at some point since arming
    seen_full: bool,
    local_role: Option<Role>,
    last_applied_end_nonce: u64,
}

impl EndgameWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a new round
    ///
    /// End records already present in the store belong to earlier games and
    /// are never applied.
    pub fn arm<S: SessionStore>(&mut self, state: &SessionState<S>) {
        self.active = true;
        self.ended = false;
        self.seen_full = state.member_count() >= MIN_MEMBERS;
        self.local_role = state.local_role();
        self.last_applied_end_nonce = state.game_end_nonce();
        tracing::debug!(
            "Endgame watcher armed (role {:?}, GameEndNonce {})",
            self.local_role,
            self.last_applied_end_nonce
        );
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn last_applied_end_nonce(&self) -> u64 {
        self.last_applied_end_nonce
    }

    /// Evaluate both triggers; returns the outcome at most once per round
    pub fn check<S: SessionStore>(&mut self, state: &SessionState<S>) -> Option<GameOutcome> {
        if !self.active || self.ended {
            return None;
        }

        let count = state.member_count();
        if count >= MIN_MEMBERS {
            self.seen_full = true;
        } else if count == 1 && self.seen_full {
            self.ended = true;
            let winner = self.local_role.map(Winner::from).unwrap_or_default();
            tracing::info!("Opponent left the session, {} wins by forfeit", winner);
            return Some(GameOutcome {
                winner,
                reason: EndReason::Forfeit,
            });
        }

        if state.is_host() {
            return None;
        }
        let (end_nonce, winner) = state.try_read_end();
        if end_nonce <= self.last_applied_end_nonce {
            return None;
        }
        self.last_applied_end_nonce = end_nonce;
        self.ended = true;
        tracing::info!("Host published game end {}: {}", end_nonce, winner);
        Some(GameOutcome {
            winner,
            reason: EndReason::Published,
        })
    }

    /// End the round locally without a trigger (host result, barrier timeout)
    ///
    /// Returns false when the round had already ended.
    pub fn finish(&mut self) -> bool {
        if self.ended {
            return false;
        }
        self.ended = true;
        true
    }

    /// Role the local peer held when the round was armed
    pub fn local_role(&self) -> Option<Role> {
        self.local_role
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryHub, MemoryStore, SessionStore};
    use crate::types::MemberId;

    fn member(name: &str) -> MemberId {
        MemberId::from_name(name.to_string()).unwrap()
    }

    fn pair() -> (SessionState<MemoryStore>, SessionState<MemoryStore>) {
        let hub = MemoryHub::new();
        let host = SessionState::new(hub.connect(member("host")));
        let guest = SessionState::new(hub.connect(member("guest")));
        let session_id = host.store().create_session().unwrap();
        guest.store().join_session(&session_id).unwrap();
        host.assign_default_roles();
        (host, guest)
    }

    #[test]
    fn test_unarmed_watcher_is_silent() {
        let (host, guest) = pair();
        host.publish_end(Winner::Rabbit);
        let mut watcher = EndgameWatcher::new();
        assert_eq!(watcher.check(&guest), None);
    }

    #[test]
    fn test_forfeit_when_opponent_leaves() {
        let (host, guest) = pair();
        let mut watcher = EndgameWatcher::new();
        watcher.arm(&guest);
        assert_eq!(watcher.check(&guest), None);

        host.store().leave_session();

        assert_eq!(
            watcher.check(&guest),
            Some(GameOutcome {
                winner: Winner::Mole,
                reason: EndReason::Forfeit
            })
        );
        assert!(watcher.has_ended());
        assert_eq!(watcher.check(&guest), None);
    }

    #[test]
    fn test_host_wins_forfeit_with_its_role() {
        let (host, guest) = pair();
        host.swap_roles();
        let mut watcher = EndgameWatcher::new();
        watcher.arm(&host);

        guest.store().leave_session();

        let outcome = watcher.check(&host).unwrap();
        assert_eq!(outcome.winner, Winner::Mole);
        assert_eq!(outcome.reason, EndReason::Forfeit);
    }

    #[test]
    fn test_no_forfeit_without_full_session() {
        let hub = MemoryHub::new();
        let host = SessionState::new(hub.connect(member("host")));
        host.store().create_session().unwrap();
        let mut watcher = EndgameWatcher::new();
        watcher.arm(&host);
        assert_eq!(watcher.check(&host), None);
    }

    #[test]
    fn test_published_end_applied_once() {
        let (host, guest) = pair();
        let mut watcher = EndgameWatcher::new();
        watcher.arm(&guest);

        host.publish_end(Winner::Both);
        let outcome = watcher.check(&guest).unwrap();
        assert_eq!(outcome.winner, Winner::Both);
        assert_eq!(outcome.reason, EndReason::Published);
        assert_eq!(watcher.last_applied_end_nonce(), 1);

        // Same nonce observed again
        assert_eq!(watcher.check(&guest), None);
        assert_eq!(watcher.check(&guest), None);
    }

    #[test]
    fn test_host_ignores_its_own_record() {
        let (host, _guest) = pair();
        let mut watcher = EndgameWatcher::new();
        watcher.arm(&host);
        host.publish_end(Winner::Rabbit);
        assert_eq!(watcher.check(&host), None);
    }

    #[test]
    fn test_rearm_skips_previous_results() {
        let (host, guest) = pair();
        host.publish_end(Winner::Rabbit);

        let mut watcher = EndgameWatcher::new();
        watcher.arm(&guest);
        assert_eq!(watcher.check(&guest), None);

        host.publish_end(Winner::Mole);
        assert_eq!(watcher.check(&guest).map(|o| o.winner), Some(Winner::Mole));

        watcher.arm(&guest);
        assert!(!watcher.has_ended());
        assert_eq!(watcher.check(&guest), None);
    }

    #[test]
    fn test_finish_blocks_later_triggers() {
        let (host, guest) = pair();
        let mut watcher = EndgameWatcher::new();
        watcher.arm(&guest);
        assert!(watcher.finish());
        assert!(!watcher.finish());

        host.publish_end(Winner::Rabbit);
        host.store().leave_session();
        assert_eq!(watcher.check(&guest), None);
    }
}
