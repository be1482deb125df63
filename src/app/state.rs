//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{ArenaGame, CatchGame};
use crate::room::RoomManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Rooms served on `/ws`
    pub arena: Arc<RoomManager<ArenaGame>>,
    /// Rooms served on `/catch/ws`
    pub catch: Arc<RoomManager<CatchGame>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let arena = Arc::new(RoomManager::new(config.arena.clone()));
        let catch = Arc::new(RoomManager::new(config.catch.clone()));

        Self {
            config,
            arena,
            catch,
        }
    }

    pub fn room_count(&self) -> usize {
        self.arena.room_count() + self.catch.room_count()
    }
}
