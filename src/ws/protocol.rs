//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::entity::WeaponKind;
use crate::game::MoveInput;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Open a new room and take slot 1
    CreateRoom,

    /// Join an existing room by code
    JoinRoom { room_id: String },

    /// Slot 1 asks to begin the round
    GameStart,

    /// Slot 1 asks to go back to the lobby after a round
    #[serde(alias = "restart")]
    GameRestart,

    /// Position update. The catch variant only reads `x`
    /// (also accepted as `basket`).
    PlayerMove {
        #[serde(alias = "basket")]
        x: f32,
        #[serde(default)]
        y: f32,
        #[serde(default)]
        angle: f32,
    },

    /// Fire the equipped weapon. `weapon_type` is informational only;
    /// the server always fires what the player has equipped.
    PlayerShoot {
        angle: f32,
        #[serde(default)]
        weapon_type: Option<WeaponKind>,
    },

    Ping,
}

impl ClientMsg {
    /// Move payload, if this is a move
    pub fn as_move(&self) -> Option<MoveInput> {
        match *self {
            ClientMsg::PlayerMove { x, y, angle } => Some(MoveInput { x, y, angle }),
            _ => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    RoomCreated {
        room_id: String,
        player_id: Uuid,
        slot: u8,
    },

    RoomJoined {
        room_id: String,
        player_id: Uuid,
        slot: u8,
    },

    RoomNotFound {
        message: String,
    },

    RoomFull {
        message: String,
    },

    /// The other slot was filled
    PlayerJoined {
        player_id: Uuid,
    },

    /// The other participant disconnected
    PlayerLeft {
        player_id: Uuid,
        message: String,
    },

    GameStarted {
        game_state: serde_json::Value,
    },

    /// Authoritative snapshot, sent every tick while playing
    GameState {
        game_state: serde_json::Value,
    },

    GameEnded {
        /// Winning player, absent on a draw
        winner: Option<Uuid>,
        draw: bool,
        game_state: serde_json::Value,
    },

    /// The round was reset; slot 1 has to start again
    RestartRequest {
        message: String,
    },

    Error {
        message: String,
    },

    Pong,
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMsg::Error {
            message: message.into(),
        }
    }
}
