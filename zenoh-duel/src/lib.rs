//! # zenoh-duel
//!
//! Lobby and synchronized-start coordination for two-player games, built on
//! a shared key-value store replicated over Zenoh.
//!
//! ## Overview
//!
//! One peer hosts a session, the other joins it. The only channel between
//! them is replicated session state: a role table, per-member ready and
//! loaded markers, and a handful of monotonic counters (nonces) that let
//! each peer tell a fresh signal from a stale one.
//!
//! ## Key Features
//!
//! - Role table with host-driven swaps that invalidate outstanding ready votes
//! - Two-phase load barrier: nobody simulates until both scenes are up
//! - Disconnect-as-forfeit and host-published results, applied exactly once
//! - Store backends behind a trait: Zenoh, in-process memory, or none at all
//!
//! ## Example
//!
//! ```rust,no_run
//! use zenoh_duel::{DuelConfig, DuelSession, GameDriver, GameOutcome, MemberId, StartRequest};
//! use zenoh_duel::store::MemoryHub;
//!
//! struct Game;
//!
//! impl GameDriver for Game {
//!     fn load_scene(&mut self, _request: &StartRequest) {}
//!     fn pause(&mut self) {}
//!     fn resume(&mut self) {}
//!     fn begin_game(&mut self) {}
//!     fn end_game(&mut self, _outcome: &GameOutcome) {}
//! }
//!
//! fn main() -> zenoh_duel::Result<()> {
//!     let hub = MemoryHub::new();
//!     let store = hub.connect(MemberId::generate());
//!     let mut session = DuelSession::new(store, Game, DuelConfig::default());
//!     let session_id = session.create()?;
//!     println!("Hosting {}", session_id);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod endgame;
pub mod error;
pub mod lobby;
pub mod name_generator;
pub mod state;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use config::DuelConfig;
pub use coordinator::{StartCoordinator, StartEvent, StartPhase};
pub use driver::GameDriver;
pub use endgame::EndgameWatcher;
pub use error::{DuelError, Result};
pub use lobby::{ConnectionStatus, DuelEvent, DuelSession};
pub use state::SessionState;
pub use store::{SessionExt, SessionStore};
pub use types::{
    EndReason, GameOutcome, MemberId, PlayerInfo, Role, SessionId, StartRequest, Winner,
};
