//! Synchronized game start
//!
//! Per-peer state machine for one round:
//!
//! ```text
//! Idle -> SceneShown -> Loaded -> AwaitingBegin -> Started
//!                                      \-> Abandoned (barrier timeout)
//! ```
//!
//! The host opens a round by bumping StartNonce. Each peer loads the scene,
//! pauses its simulation and reports `LoadedNonce = StartNonce`. Once the
//! host sees every member loaded for the round it sets
//! `BeginNonce = StartNonce`, and each peer resumes when it observes that.
//! Every decision re-reads the store and compares nonces for equality, so
//! repeated or reordered notifications are no-ops and a signal left over
//! from an older round never matches the round being loaded.

use std::time::{Duration, Instant};

use crate::driver::GameDriver;
use crate::state::SessionState;
use crate::store::SessionStore;
use crate::types::StartRequest;

/// Where the local peer is within the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPhase {
    #[default]
    Idle,
    SceneShown,
    Loaded,
    AwaitingBegin,
    Started,
    /// The barrier timed out; this round never begins on this peer
    Abandoned,
}

/// Something the coordinator did that the session layer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartEvent {
    /// A round this peer had not seen yet was opened; its scene is loading
    RoundOpened(StartRequest),
    /// The load barrier passed and gameplay began
    Started { start_nonce: u64 },
    /// The local peer waited longer than the configured barrier timeout
    BarrierTimedOut { start_nonce: u64 },
}

/// Turns the host's start intent into a synchronized begin on both peers
#[derive(Debug, Default)]
pub struct StartCoordinator {
    phase: StartPhase,
    /// Round this peer is loading (0 = none)
    local_start_nonce: u64,
    /// Highest StartNonce already acted upon
    last_seen_start_nonce: u64,
    started: bool,
    loaded_at: Option<Instant>,
    barrier_timeout: Option<Duration>,
}

impl StartCoordinator {
    pub fn new(barrier_timeout: Option<Duration>) -> Self {
        Self {
            barrier_timeout,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> StartPhase {
        self.phase
    }

    pub fn local_start_nonce(&self) -> u64 {
        self.local_start_nonce
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Forget everything; the next session starts counting from scratch
    pub fn reset_for_new_session(&mut self) {
        *self = Self::new(self.barrier_timeout);
    }

    /// Return to the lobby of the same session
    ///
    /// Rounds up to `baseline` are treated as already handled so the round
    /// that just ended is not loaded again.
    pub fn rearm(&mut self, baseline: u64) {
        self.reset_for_new_session();
        self.last_seen_start_nonce = baseline;
    }

    /// Record which round this peer is loading
    ///
    /// Switching to a different round abandons the current one.
    pub fn set_local_start_nonce(&mut self, start_nonce: u64) {
        if start_nonce != self.local_start_nonce && self.phase != StartPhase::Idle {
            tracing::info!(
                "Abandoning round {} for round {}",
                self.local_start_nonce,
                start_nonce
            );
        }
        if start_nonce != self.local_start_nonce {
            self.phase = StartPhase::Idle;
            self.started = false;
            self.loaded_at = None;
        }
        self.local_start_nonce = start_nonce;
        self.last_seen_start_nonce = self.last_seen_start_nonce.max(start_nonce);
    }

    /// The gameplay scene of the current round became visible
    pub fn on_scene_shown<S, G>(
        &mut self,
        state: &SessionState<S>,
        driver: &mut G,
        now: Instant,
    ) -> Option<StartEvent>
    where
        S: SessionStore,
        G: GameDriver + ?Sized,
    {
        if self.started || self.phase == StartPhase::Abandoned {
            tracing::debug!("Scene shown again for closed round {}", self.local_start_nonce);
            return None;
        }
        // Nothing may tick before both peers are in
        driver.pause();
        self.phase = StartPhase::SceneShown;

        if self.local_start_nonce == 0 {
            tracing::warn!("Gameplay scene shown without a start request, staying paused");
            return None;
        }
        state.mark_loaded(self.local_start_nonce);
        self.phase = StartPhase::Loaded;
        self.loaded_at = Some(now);

        self.on_store_changed(state, driver)
    }

    /// Re-evaluate the round after any change to the store
    pub fn on_store_changed<S, G>(
        &mut self,
        state: &SessionState<S>,
        driver: &mut G,
    ) -> Option<StartEvent>
    where
        S: SessionStore,
        G: GameDriver + ?Sized,
    {
        self.maybe_signal_begin(state);

        if let Some(request) = self.detect_new_round(state) {
            driver.load_scene(&request);
            return Some(StartEvent::RoundOpened(request));
        }

        self.try_start(state, driver)
    }

    /// Per-tick poll: store re-evaluation plus the barrier timeout
    pub fn tick<S, G>(
        &mut self,
        state: &SessionState<S>,
        driver: &mut G,
        now: Instant,
    ) -> Option<StartEvent>
    where
        S: SessionStore,
        G: GameDriver + ?Sized,
    {
        if let Some(event) = self.on_store_changed(state, driver) {
            return Some(event);
        }

        let (Some(timeout), Some(loaded_at)) = (self.barrier_timeout, self.loaded_at) else {
            return None;
        };
        let waiting = matches!(self.phase, StartPhase::Loaded | StartPhase::AwaitingBegin);
        if !waiting || self.started {
            return None;
        }
        if now.saturating_duration_since(loaded_at) < timeout {
            return None;
        }
        // Withdraw the loaded marker so the host can never pass this barrier
        self.phase = StartPhase::Abandoned;
        state.mark_loaded(0);
        tracing::warn!(
            "Round {} still not begun after {:?}",
            self.local_start_nonce,
            timeout
        );
        Some(StartEvent::BarrierTimedOut {
            start_nonce: self.local_start_nonce,
        })
    }

    fn detect_new_round<S: SessionStore>(&mut self, state: &SessionState<S>) -> Option<StartRequest> {
        let request = state.start_request()?;
        if request.start_nonce <= self.last_seen_start_nonce {
            return None;
        }
        tracing::info!(
            "Round {} opened (map {}, day {})",
            request.start_nonce,
            request.map_id,
            request.day
        );
        self.set_local_start_nonce(request.start_nonce);
        Some(request)
    }

    /// Host side, independent of the local phase
    fn maybe_signal_begin<S: SessionStore>(&self, state: &SessionState<S>) {
        if !state.is_host() {
            return;
        }
        let start_nonce = state.start_nonce();
        if start_nonce == 0 || state.begin_nonce() == start_nonce {
            return;
        }
        if self.phase == StartPhase::Abandoned && start_nonce == self.local_start_nonce {
            return;
        }
        if state.all_members_loaded_for(start_nonce) {
            state.signal_begin(start_nonce);
        }
    }

    fn try_start<S, G>(&mut self, state: &SessionState<S>, driver: &mut G) -> Option<StartEvent>
    where
        S: SessionStore,
        G: GameDriver + ?Sized,
    {
        if self.started || self.local_start_nonce == 0 {
            return None;
        }
        if !matches!(self.phase, StartPhase::Loaded | StartPhase::AwaitingBegin) {
            return None;
        }
        let start_nonce = state.start_nonce();
        let begin_nonce = state.begin_nonce();
        if begin_nonce != start_nonce || start_nonce != self.local_start_nonce {
            self.phase = StartPhase::AwaitingBegin;
            return None;
        }

        self.started = true;
        self.phase = StartPhase::Started;
        driver.resume();
        driver.begin_game();
        tracing::info!("Round {} started", start_nonce);
        Some(StartEvent::Started { start_nonce })
    }
}
