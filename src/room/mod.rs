//! Room registry, per-room sessions and their tick drivers

pub mod code;
pub mod manager;
pub mod session;

pub use manager::{RoomManager, SessionRef};
pub use session::{Session, SharedSession, Slot};

use thiserror::Error;

use crate::ws::protocol::ServerMsg;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,

    #[error("Room is full")]
    Full,

    #[error("Already in a room")]
    AlreadyInRoom,
}

impl RoomError {
    /// Reply sent to the requester only
    pub fn to_server_msg(&self) -> ServerMsg {
        let message = self.to_string();
        match self {
            RoomError::NotFound => ServerMsg::RoomNotFound { message },
            RoomError::Full => ServerMsg::RoomFull { message },
            RoomError::AlreadyInRoom => ServerMsg::Error { message },
        }
    }
}
