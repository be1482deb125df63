//! Game simulation modules

pub mod arena;
pub mod catcher;
pub mod combat;
pub mod entity;
pub mod physics;
pub mod snapshot;

pub use arena::{ArenaConfig, ArenaGame};
pub use catcher::{CatchConfig, CatchGame};
pub use entity::{RoundStatus, Winner};

use std::time::Duration;

use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use uuid::Uuid;

use self::combat::EffectReversal;

/// Per-session random source; seeded so a round can be replayed in tests
pub type SessionRng = ChaCha8Rng;

/// Position/orientation update sent by a client
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveInput {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// A temporary effect to undo once `after` has elapsed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledReversal {
    pub player_id: Uuid,
    pub reversal: EffectReversal,
    pub after: Duration,
}

/// What a single simulation step produced besides the mutated state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// The round transitioned to `ended` during this step
    pub ended: bool,
    pub reversals: Vec<ScheduledReversal>,
}

/// A two-player game variant driven by the room layer.
///
/// Implementations own their round state and must treat every mutating call
/// as a no-op while the round is not `playing` (except `begin`/`reset`).
pub trait GameMode: Send + 'static {
    type Config: Clone + Send + Sync + 'static;
    /// Wire form of the round, broadcast every tick
    type State: Serialize;

    /// Short name used in logs and the health endpoint
    const NAME: &'static str;

    fn new(config: &Self::Config) -> Self;

    fn tick_interval(config: &Self::Config) -> Duration;

    fn status(&self) -> RoundStatus;

    fn state(&self) -> &Self::State;

    /// Set up a fresh round for the two slot occupants and start playing
    fn begin(&mut self, slot1: Uuid, slot2: Uuid, rng: &mut SessionRng);

    /// Drop everything and go back to `waiting`
    fn reset(&mut self);

    /// Advance the round by `dt_ms`
    fn step(&mut self, dt_ms: f32, rng: &mut SessionRng) -> StepOutcome;

    /// Returns true if the move was applied
    fn apply_move(&mut self, player_id: Uuid, input: MoveInput) -> bool;

    /// Returns true if anything was spawned
    fn apply_shoot(&mut self, _player_id: Uuid, _angle: f32) -> bool {
        false
    }

    fn apply_reversal(&mut self, _player_id: Uuid, _reversal: EffectReversal) {}

    /// Remove a departing player. A round in progress ends with the other
    /// player as winner; returns true if that happened.
    fn forfeit(&mut self, leaver: Uuid) -> bool;

    fn winner(&self) -> Option<Winner>;
}
