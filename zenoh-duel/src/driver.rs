use crate::types::{GameOutcome, StartRequest};

/// Trait for integrating the local game with the session protocol
///
/// The session calls these hooks from its own tick; none of them may block.
/// Scene loading is asynchronous from the protocol's point of view: after
/// `load_scene` the game reports visibility back through
/// [`DuelSession::on_gameplay_scene_shown`](crate::DuelSession::on_gameplay_scene_shown).
pub trait GameDriver {
    /// Start loading the gameplay scene for a round
    fn load_scene(&mut self, request: &StartRequest);

    /// Freeze the local simulation
    fn pause(&mut self);

    /// Unfreeze the local simulation
    fn resume(&mut self);

    /// Both peers are loaded; gameplay starts now
    fn begin_game(&mut self);

    /// The game is over
    fn end_game(&mut self, outcome: &GameOutcome);
}

impl<G: GameDriver + ?Sized> GameDriver for Box<G> {
    fn load_scene(&mut self, request: &StartRequest) {
        (**self).load_scene(request)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn begin_game(&mut self) {
        (**self).begin_game()
    }

    fn end_game(&mut self, outcome: &GameOutcome) {
        (**self).end_game(outcome)
    }
}
