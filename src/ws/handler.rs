//! WebSocket upgrade handlers and the per-connection read/write loop

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameMode;
use crate::room::{RoomError, RoomManager, SessionRef};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::relay::PeerHandle;

/// `/ws`: arena rooms
pub async fn arena_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rooms = state.arena.clone();
    let rate = state.config.input_rate_limit;
    ws.on_upgrade(move |socket| handle_socket(socket, rooms, rate))
}

/// `/catch/ws`: catch rooms
pub async fn catch_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let rooms = state.catch.clone();
    let rate = state.config.input_rate_limit;
    ws.on_upgrade(move |socket| handle_socket(socket, rooms, rate))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket<M: GameMode>(socket: WebSocket, rooms: Arc<RoomManager<M>>, rate: u32) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, mode = M::NAME, "New WebSocket connection");

    let (peer, mut outbound_rx) = PeerHandle::channel(player_id);
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Writer task: outbound queue -> WebSocket
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(frame.to_string())).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = PlayerRateLimiter::new(rate);
    let mut conn = Connection::new(peer);

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }
                conn.handle_text(&rooms, &text);
            }
            Ok(Message::Close(_)) => {
                debug!(player_id = %player_id, "Client sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    conn.disconnect(&rooms);
    writer.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// What one socket knows about itself: its outbound handle and its room
struct Connection {
    peer: PeerHandle,
    room: Option<SessionRef>,
}

impl Connection {
    fn new(peer: PeerHandle) -> Self {
        Self { peer, room: None }
    }

    fn handle_text<M: GameMode>(&mut self, rooms: &RoomManager<M>, text: &str) {
        match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => self.dispatch(rooms, msg),
            Err(e) => {
                warn!(player_id = %self.peer.player_id, error = %e, "Invalid client message");
                self.peer.send(&ServerMsg::error("Invalid message format"));
            }
        }
    }

    fn dispatch<M: GameMode>(&mut self, rooms: &RoomManager<M>, msg: ClientMsg) {
        match msg {
            ClientMsg::CreateRoom => {
                if self.room.is_some() {
                    self.peer.send(&RoomError::AlreadyInRoom.to_server_msg());
                    return;
                }
                self.room = Some(rooms.create_room(self.peer.clone()));
            }

            ClientMsg::JoinRoom { room_id } => {
                if self.room.is_some() {
                    self.peer.send(&RoomError::AlreadyInRoom.to_server_msg());
                    return;
                }
                match rooms.join_room(&room_id, self.peer.clone()) {
                    Ok(at) => self.room = Some(at),
                    Err(e) => {
                        debug!(
                            player_id = %self.peer.player_id,
                            room = %room_id,
                            error = %e,
                            "Join failed"
                        );
                        self.peer.send(&e.to_server_msg());
                    }
                }
            }

            ClientMsg::Ping => self.peer.send(&ServerMsg::Pong),

            // Everything else needs a room; without one it's dropped
            msg => {
                let Some(at) = &self.room else {
                    debug!(player_id = %self.peer.player_id, "Message outside a room ignored");
                    return;
                };
                match msg {
                    ClientMsg::GameStart => {
                        rooms.start_game(at);
                    }
                    ClientMsg::GameRestart => {
                        rooms.restart_game(at);
                    }
                    ClientMsg::PlayerMove { .. } => {
                        if let Some(input) = msg.as_move() {
                            rooms.handle_move(at, input);
                        }
                    }
                    ClientMsg::PlayerShoot { angle, .. } => rooms.handle_shoot(at, angle),
                    ClientMsg::CreateRoom | ClientMsg::JoinRoom { .. } | ClientMsg::Ping => {}
                }
            }
        }
    }

    fn disconnect<M: GameMode>(&mut self, rooms: &RoomManager<M>) {
        if let Some(at) = self.room.take() {
            rooms.leave(&at);
        }
    }
}
