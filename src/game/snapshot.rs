//! Snapshot building for network transmission

use crate::ws::protocol::ServerMsg;

use super::{GameMode, Winner};

/// Which lifecycle point a snapshot is taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Started,
    Tick,
    Ended,
}

/// Turns a game's round state into the matching server message
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn build<M: GameMode>(game: &M, frame: Frame) -> Result<ServerMsg, serde_json::Error> {
        let game_state = serde_json::to_value(game.state())?;
        let msg = match frame {
            Frame::Started => ServerMsg::GameStarted { game_state },
            Frame::Tick => ServerMsg::GameState { game_state },
            Frame::Ended => {
                let (winner, draw) = match game.winner() {
                    Some(Winner::Player(id)) => (Some(id), false),
                    Some(Winner::Draw) => (None, true),
                    None => (None, false),
                };
                ServerMsg::GameEnded {
                    winner,
                    draw,
                    game_state,
                }
            }
        };
        Ok(msg)
    }
}

/// Per-round broadcast accounting, logged when the round ends
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
    }

    pub fn avg_bytes(&self) -> u64 {
        if self.total_snapshots == 0 {
            return 0;
        }
        self.total_bytes / self.total_snapshots
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
