use std::time::{Duration, Instant};

use console::style;
use zenoh_duel::{EndReason, GameDriver, GameOutcome, StartRequest};

/// Terminal stand-in for a real game: scenes "load" after a fixed delay
pub struct BurrowDriver {
    label: String,
    load_time: Duration,
    loading: Option<(StartRequest, Instant)>,
    paused: bool,
    in_game: bool,
}

impl BurrowDriver {
    pub fn new(label: impl Into<String>, load_time: Duration) -> Self {
        Self {
            label: label.into(),
            load_time,
            loading: None,
            paused: false,
            in_game: false,
        }
    }

    /// True once per scene, when its load delay has elapsed
    pub fn poll_scene_shown(&mut self, now: Instant) -> bool {
        match self.loading {
            Some((request, ready_at)) if now >= ready_at => {
                self.loading = None;
                println!(
                    "[{}] scene for round {} is up",
                    self.label, request.start_nonce
                );
                true
            }
            _ => false,
        }
    }

    pub fn in_game(&self) -> bool {
        self.in_game
    }

    /// Loading a scene or holding at the load barrier
    pub fn is_busy(&self) -> bool {
        self.loading.is_some() || self.paused
    }
}

impl GameDriver for BurrowDriver {
    fn load_scene(&mut self, request: &StartRequest) {
        println!(
            "[{}] loading map {} (day {}) for round {}",
            self.label, request.map_id, request.day, request.start_nonce
        );
        self.in_game = false;
        self.loading = Some((*request, Instant::now() + self.load_time));
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn begin_game(&mut self) {
        self.in_game = true;
        println!("[{}] {}", self.label, style("GO! burrow away").green().bold());
    }

    fn end_game(&mut self, outcome: &GameOutcome) {
        self.in_game = false;
        self.paused = false;
        self.loading = None;
        let reason = match outcome.reason {
            EndReason::Forfeit => "opponent left",
            EndReason::Published => "host called it",
            EndReason::LoadTimeout => "opponent never loaded",
        };
        println!(
            "[{}] {} winner: {} ({})",
            self.label,
            style("game over,").yellow().bold(),
            outcome.winner,
            reason
        );
    }
}
