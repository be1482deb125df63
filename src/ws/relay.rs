//! Fan-out of server messages to the occupants of a room

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Outbound queue depth per connection
pub const OUTBOUND_CAPACITY: usize = 64;

/// Serialized frame shared between all recipients
pub type Outbound = Arc<str>;

/// Send side of one connection's outbound queue
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub player_id: Uuid,
    tx: mpsc::Sender<Outbound>,
}

impl PeerHandle {
    pub fn new(player_id: Uuid, tx: mpsc::Sender<Outbound>) -> Self {
        Self { player_id, tx }
    }

    /// Create a handle plus the receiver the connection's writer drains
    pub fn channel(player_id: Uuid) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self::new(player_id, tx), rx)
    }

    /// Fire-and-forget. A full or closed queue drops the frame.
    pub fn deliver(&self, frame: Outbound) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(player_id = %self.player_id, "Outbound queue full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(player_id = %self.player_id, "Outbound queue closed");
            }
        }
    }

    pub fn send(&self, msg: &ServerMsg) {
        if let Some(frame) = Relay::encode(msg) {
            self.deliver(frame);
        }
    }
}

/// Stateless broadcast helpers
pub struct Relay;

impl Relay {
    pub fn encode(msg: &ServerMsg) -> Option<Outbound> {
        match serde_json::to_string(msg) {
            Ok(json) => Some(Arc::from(json)),
            Err(e) => {
                error!(error = %e, "Failed to serialize server message");
                None
            }
        }
    }

    /// Serialize once and deliver to every present peer except `exclude`.
    /// Returns the encoded size, 0 if nothing was encoded.
    pub fn broadcast<'a>(
        peers: impl IntoIterator<Item = &'a PeerHandle>,
        msg: &ServerMsg,
        exclude: Option<Uuid>,
    ) -> usize {
        let Some(frame) = Self::encode(msg) else {
            return 0;
        };
        for peer in peers {
            if Some(peer.player_id) == exclude {
                continue;
            }
            peer.deliver(frame.clone());
        }
        frame.len()
    }
}
