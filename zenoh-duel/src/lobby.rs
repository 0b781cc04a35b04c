//! Duel session: the object the game and UI layers talk to
//!
//! Owns the typed session state, the start coordinator, the endgame watcher
//! and the local [`GameDriver`]. Everything is driven from [`DuelSession::tick`]:
//! call it from the game loop, it drains store notifications, polls both
//! state machines and reports what happened.

use std::time::Instant;

use crate::config::DuelConfig;
use crate::coordinator::{StartCoordinator, StartEvent, StartPhase};
use crate::driver::GameDriver;
use crate::endgame::EndgameWatcher;
use crate::error::Result;
use crate::name_generator;
use crate::state::SessionState;
use crate::store::{SessionStore, StoreEvent};
use crate::types::{EndReason, GameOutcome, PlayerInfo, SessionId, StartRequest, Winner};

/// What the local peer is, as shown in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The store platform is not initialized
    Unavailable,
    /// Connected but not in a session
    Idle,
    Host,
    Guest,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Unavailable => write!(f, "not connected"),
            ConnectionStatus::Idle => write!(f, "not in a session"),
            ConnectionStatus::Host => write!(f, "hosting"),
            ConnectionStatus::Guest => write!(f, "guest"),
        }
    }
}

/// Reported by [`DuelSession::tick`] and the other entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelEvent {
    /// Lobby contents (members, roles, readiness) may have changed
    LobbyChanged,
    /// A round was opened and its scene requested from the driver
    RoundOpened(StartRequest),
    /// Both peers passed the load barrier
    Started { start_nonce: u64 },
    /// The game ended locally
    Ended(GameOutcome),
}

pub struct DuelSession<S: SessionStore, G: GameDriver> {
    config: DuelConfig,
    display_name: String,
    state: SessionState<S>,
    coordinator: StartCoordinator,
    watcher: EndgameWatcher,
    driver: G,
    outcome: Option<GameOutcome>,
}

impl<S: SessionStore, G: GameDriver> DuelSession<S, G> {
    pub fn new(store: S, driver: G, config: DuelConfig) -> Self {
        let display_name = config
            .display_name
            .clone()
            .unwrap_or_else(name_generator::generate_display_name);
        let coordinator = StartCoordinator::new(config.load_barrier_timeout);
        Self {
            config,
            display_name,
            state: SessionState::new(store),
            coordinator,
            watcher: EndgameWatcher::new(),
            driver,
            outcome: None,
        }
    }

    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn state(&self) -> &SessionState<S> {
        &self.state
    }

    pub fn driver(&self) -> &G {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut G {
        &mut self.driver
    }

    pub fn start_phase(&self) -> StartPhase {
        self.coordinator.phase()
    }

    /// Outcome of the current round, once it ended
    pub fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.state.store().current_session()
    }

    pub fn status(&self) -> ConnectionStatus {
        if !self.state.store().is_available() {
            ConnectionStatus::Unavailable
        } else if !self.state.in_session() {
            ConnectionStatus::Idle
        } else if self.state.is_host() {
            ConnectionStatus::Host
        } else {
            ConnectionStatus::Guest
        }
    }

    /// Create a session and become its host
    pub fn create(&mut self) -> Result<SessionId> {
        let session_id = self.state.store().create_session()?;
        self.enter();
        self.state.assign_default_roles();
        tracing::info!("Hosting session {} as '{}'", session_id, self.display_name);
        Ok(session_id)
    }

    /// Join a session as guest
    pub fn join(&mut self, session_id: &SessionId) -> Result<()> {
        self.state.store().join_session(session_id)?;
        self.enter();
        tracing::info!("Joined session {} as '{}'", session_id, self.display_name);
        Ok(())
    }

    fn enter(&mut self) {
        self.coordinator.reset_for_new_session();
        self.watcher.reset();
        self.outcome = None;
        self.state.write_display_name(&self.display_name);
    }

    /// Leave the current session; the opponent wins by forfeit if a game
    /// was running
    pub fn leave(&mut self) {
        if let Some(session_id) = self.session_id() {
            tracing::info!("Leaving session {}", session_id);
        }
        self.state.store().leave_session();
        self.coordinator.reset_for_new_session();
        self.watcher.reset();
        self.outcome = None;
    }

    pub fn set_ready(&self, ready: bool) -> bool {
        self.state.set_ready(ready)
    }

    pub fn swap_roles(&self) -> u64 {
        self.state.swap_roles()
    }

    pub fn players(&self) -> Vec<PlayerInfo> {
        self.state.players()
    }

    pub fn can_host_start(&self) -> bool {
        self.state.can_host_start()
    }

    /// Host: open a round and start loading its scene
    ///
    /// Returns the new StartNonce, or 0 when rejected.
    pub fn request_start(&mut self, map_id: u64, day: u64) -> u64 {
        let start_nonce = self.state.request_start(map_id, day);
        if start_nonce == 0 {
            return 0;
        }
        self.coordinator.set_local_start_nonce(start_nonce);
        let request = StartRequest {
            start_nonce,
            map_id,
            day,
        };
        self.open_round();
        self.driver.load_scene(&request);
        start_nonce
    }

    fn open_round(&mut self) {
        self.outcome = None;
        self.watcher.arm(&self.state);
    }

    /// The scene layer made the gameplay scene visible
    pub fn on_gameplay_scene_shown(&mut self, now: Instant) -> Vec<DuelEvent> {
        let mut events = Vec::new();
        if !self.watcher.is_active() {
            self.watcher.arm(&self.state);
        }
        let event = self
            .coordinator
            .on_scene_shown(&self.state, &mut self.driver, now);
        self.handle_start_event(event, &mut events);
        events
    }

    /// Host: publish the result and end the game locally
    ///
    /// Only the first result of a round is published. Returns the new
    /// GameEndNonce, or 0 when rejected.
    pub fn publish_end(&mut self, winner: Winner) -> u64 {
        if !self.watcher.is_active() || self.watcher.has_ended() {
            tracing::warn!("PublishEnd rejected: no game in progress");
            return 0;
        }
        let end_nonce = self.state.publish_end(winner);
        if end_nonce == 0 {
            return 0;
        }
        self.end_locally(GameOutcome {
            winner,
            reason: EndReason::Published,
        });
        end_nonce
    }

    /// Drive the session one step
    pub fn tick(&mut self, now: Instant) -> Vec<DuelEvent> {
        let mut events = Vec::new();
        let changed = self
            .state
            .store()
            .drain_events()
            .iter()
            .any(|event| !matches!(event, StoreEvent::SessionStateChanged));
        if changed {
            events.push(DuelEvent::LobbyChanged);
        }
        if !self.state.in_session() {
            return events;
        }

        let event = self.coordinator.tick(&self.state, &mut self.driver, now);
        self.handle_start_event(event, &mut events);

        if let Some(outcome) = self.watcher.check(&self.state) {
            self.apply_outcome(outcome);
            events.push(DuelEvent::Ended(outcome));
        }
        events
    }

    /// Back to the lobby of the same session after a game
    ///
    /// Clears the local ready vote; the finished round is not loaded again.
    pub fn return_to_lobby(&mut self) {
        self.coordinator.rearm(self.state.start_nonce());
        self.watcher.reset();
        self.outcome = None;
        self.state.set_ready(false);
        tracing::info!("Returned to lobby");
    }

    fn handle_start_event(&mut self, event: Option<StartEvent>, events: &mut Vec<DuelEvent>) {
        match event {
            Some(StartEvent::RoundOpened(request)) => {
                self.open_round();
                events.push(DuelEvent::RoundOpened(request));
            }
            Some(StartEvent::Started { start_nonce }) => {
                events.push(DuelEvent::Started { start_nonce });
            }
            Some(StartEvent::BarrierTimedOut { start_nonce }) => {
                let winner = self
                    .watcher
                    .local_role()
                    .or_else(|| self.state.local_role())
                    .map(Winner::from)
                    .unwrap_or_default();
                let outcome = GameOutcome {
                    winner,
                    reason: EndReason::LoadTimeout,
                };
                tracing::warn!("Round {} abandoned, opponent never loaded", start_nonce);
                if self.end_locally(outcome) {
                    // The host's verdict is the one both peers apply
                    if self.state.is_host() {
                        self.state.publish_end(winner);
                    }
                    events.push(DuelEvent::Ended(outcome));
                }
            }
            None => {}
        }
    }

    fn end_locally(&mut self, outcome: GameOutcome) -> bool {
        if !self.watcher.finish() {
            return false;
        }
        self.apply_outcome(outcome);
        true
    }

    fn apply_outcome(&mut self, outcome: GameOutcome) {
        self.outcome = Some(outcome);
        self.driver.end_game(&outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryHub, NullStore};
    use crate::types::MemberId;

    #[derive(Debug, Default)]
    struct Silent {
        ended: Vec<GameOutcome>,
    }

    impl GameDriver for Silent {
        fn load_scene(&mut self, _request: &StartRequest) {}
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn begin_game(&mut self) {}
        fn end_game(&mut self, outcome: &GameOutcome) {
            self.ended.push(*outcome);
        }
    }

    fn member(name: &str) -> MemberId {
        MemberId::from_name(name.to_string()).unwrap()
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Unavailable.to_string(), "not connected");
        assert_eq!(ConnectionStatus::Host.to_string(), "hosting");
    }

    #[test]
    fn test_unavailable_store() {
        let mut session = DuelSession::new(NullStore, Silent::default(), DuelConfig::default());
        assert_eq!(session.status(), ConnectionStatus::Unavailable);
        assert!(session.create().is_err());
        assert_eq!(session.request_start(1, 1), 0);
        assert_eq!(session.publish_end(Winner::Both), 0);
        assert!(session.tick(Instant::now()).is_empty());
        assert!(session.players().is_empty());
    }

    #[test]
    fn test_create_and_join_status() {
        let hub = MemoryHub::new();
        let mut host = DuelSession::new(
            hub.connect(member("host")),
            Silent::default(),
            DuelConfig::new().with_display_name("Hollin"),
        );
        let mut guest = DuelSession::new(
            hub.connect(member("guest")),
            Silent::default(),
            DuelConfig::new().with_display_name("Sedge"),
        );
        assert_eq!(host.status(), ConnectionStatus::Idle);

        let session_id = host.create().unwrap();
        guest.join(&session_id).unwrap();
        assert_eq!(host.status(), ConnectionStatus::Host);
        assert_eq!(guest.status(), ConnectionStatus::Guest);
        assert!(guest.tick(Instant::now()).contains(&DuelEvent::LobbyChanged));

        let names: Vec<String> = guest.players().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Hollin".to_string(), "Sedge".to_string()]);
    }

    #[test]
    fn test_generated_display_name() {
        let session = DuelSession::new(NullStore, Silent::default(), DuelConfig::default());
        assert!(!session.display_name().is_empty());
    }

    #[test]
    fn test_guest_cannot_publish_end() {
        let hub = MemoryHub::new();
        let mut host = DuelSession::new(hub.connect(member("host")), Silent::default(), DuelConfig::default());
        let mut guest = DuelSession::new(hub.connect(member("guest")), Silent::default(), DuelConfig::default());
        let session_id = host.create().unwrap();
        guest.join(&session_id).unwrap();

        assert_eq!(guest.publish_end(Winner::Mole), 0);
        assert!(guest.driver().ended.is_empty());
        assert_eq!(host.state().game_end_nonce(), 0);
    }
}
