//! A single room: two slots, the round they play, and the timers driving it

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::game::combat::EffectReversal;
use crate::game::snapshot::{Frame, SnapshotBuilder, SnapshotStats};
use crate::game::{GameMode, MoveInput, RoundStatus, SessionRng, StepOutcome};
use crate::ws::protocol::ServerMsg;
use crate::ws::relay::{PeerHandle, Relay};

use super::RoomError;

pub type SharedSession<M> = Arc<Mutex<Session<M>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    /// 1-based number used on the wire
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    fn index(self) -> usize {
        self.number() as usize - 1
    }
}

pub struct Session<M: GameMode> {
    code: String,
    slots: [Option<PeerHandle>; 2],
    game: M,
    rng: SessionRng,
    created_at: DateTime<Utc>,
    /// Running tick driver, if any
    ticker: Option<JoinHandle<()>>,
    /// Pending effect reversals
    effect_timers: Vec<JoinHandle<()>>,
    /// Bumped whenever timers are cancelled; stale tasks compare and bail
    epoch: u64,
    stats: SnapshotStats,
    closed: bool,
}

impl<M: GameMode> Session<M> {
    pub fn new(code: String, creator: PeerHandle, config: &M::Config, seed: u64) -> Self {
        Self {
            code,
            slots: [Some(creator), None],
            game: M::new(config),
            rng: SessionRng::seed_from_u64(seed),
            created_at: Utc::now(),
            ticker: None,
            effect_timers: Vec::new(),
            epoch: 0,
            stats: SnapshotStats::default(),
            closed: false,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn status(&self) -> RoundStatus {
        self.game.status()
    }

    pub fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    #[cfg(test)]
    pub fn pending_timers(&self) -> usize {
        self.effect_timers.iter().filter(|h| !h.is_finished()).count()
    }

    #[cfg(test)]
    pub fn game_mut(&mut self) -> &mut M {
        &mut self.game
    }

    pub fn occupant(&self, slot: Slot) -> Option<&PeerHandle> {
        self.slots[slot.index()].as_ref()
    }

    pub fn slot_of(&self, player_id: Uuid) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|slot| self.occupant(*slot).map(|p| p.player_id) == Some(player_id))
    }

    pub fn occupant_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupant_count() == 0
    }

    /// Put a peer into the first free slot, confirm to it, then tell the
    /// other occupant
    pub fn fill(&mut self, peer: PeerHandle) -> Result<Slot, RoomError> {
        if self.closed {
            return Err(RoomError::NotFound);
        }
        let slot = Slot::ALL
            .into_iter()
            .find(|slot| self.occupant(*slot).is_none())
            .ok_or(RoomError::Full)?;

        let joined = peer.player_id;
        peer.send(&ServerMsg::RoomJoined {
            room_id: self.code.clone(),
            player_id: joined,
            slot: slot.number(),
        });
        self.slots[slot.index()] = Some(peer);
        self.broadcast(&ServerMsg::PlayerJoined { player_id: joined }, Some(joined));
        Ok(slot)
    }

    pub fn broadcast(&self, msg: &ServerMsg, exclude: Option<Uuid>) -> usize {
        Relay::broadcast(self.slots.iter().flatten(), msg, exclude)
    }

    fn send_snapshot(&mut self, frame: Frame, exclude: Option<Uuid>) {
        match SnapshotBuilder::build(&self.game, frame) {
            Ok(msg) => {
                let bytes = self.broadcast(&msg, exclude);
                if frame == Frame::Tick {
                    self.stats.record(bytes);
                }
            }
            Err(e) => error!(room = %self.code, error = %e, "Failed to build snapshot"),
        }
    }

    /// Start a round. Only slot 1, only from `waiting` with both slots taken;
    /// anything else is ignored.
    pub fn begin_round(&mut self, requester: Uuid) -> bool {
        if self.slot_of(requester) != Some(Slot::One) || self.status() != RoundStatus::Waiting {
            return false;
        }
        let (Some(p1), Some(p2)) = (self.occupant(Slot::One), self.occupant(Slot::Two)) else {
            return false;
        };
        let (p1, p2) = (p1.player_id, p2.player_id);

        self.cancel_timers();
        self.game.begin(p1, p2, &mut self.rng);
        self.stats.reset();
        self.send_snapshot(Frame::Started, None);

        info!(room = %self.code, mode = M::NAME, "Round started");
        true
    }

    /// One tick of the driver. `None` means the round is no longer
    /// playing and the driver should stop.
    pub fn advance(&mut self, dt_ms: f32) -> Option<StepOutcome> {
        if self.status() != RoundStatus::Playing {
            return None;
        }
        let outcome = self.game.step(dt_ms, &mut self.rng);
        self.send_snapshot(Frame::Tick, None);
        if outcome.ended {
            self.finish_round();
        }
        Some(outcome)
    }

    fn finish_round(&mut self) {
        self.send_snapshot(Frame::Ended, None);
        self.cancel_timers();
        info!(
            room = %self.code,
            mode = M::NAME,
            winner = ?self.game.winner(),
            snapshots = self.stats.total_snapshots,
            avg_bytes = self.stats.avg_bytes(),
            "Round ended"
        );
    }

    /// Apply a move and echo the new state to the opponent
    pub fn handle_move(&mut self, player_id: Uuid, input: MoveInput) {
        if self.game.apply_move(player_id, input) {
            self.send_snapshot(Frame::Tick, Some(player_id));
        }
    }

    pub fn handle_shoot(&mut self, player_id: Uuid, angle: f32) {
        if self.game.apply_shoot(player_id, angle) {
            self.send_snapshot(Frame::Tick, None);
        }
    }

    pub fn apply_reversal(&mut self, player_id: Uuid, reversal: EffectReversal) {
        self.game.apply_reversal(player_id, reversal);
    }

    /// Back to the lobby. Only slot 1, only from `ended`.
    pub fn reset_round(&mut self, requester: Uuid) -> bool {
        if self.slot_of(requester) != Some(Slot::One) || self.status() != RoundStatus::Ended {
            return false;
        }
        self.cancel_timers();
        self.game.reset();
        self.broadcast(
            &ServerMsg::RestartRequest {
                message: "Round reset, waiting for host to start".to_string(),
            },
            None,
        );
        info!(room = %self.code, "Round reset");
        true
    }

    /// Clear the leaver's slot. A round in progress is forfeited to whoever
    /// remains. Returns the freed slot.
    pub fn remove_player(&mut self, player_id: Uuid) -> Option<Slot> {
        let slot = self.slot_of(player_id)?;
        self.slots[slot.index()] = None;

        if self.game.forfeit(player_id) {
            self.finish_round();
        }
        self.broadcast(
            &ServerMsg::PlayerLeft {
                player_id,
                message: "Opponent disconnected".to_string(),
            },
            None,
        );
        if self.is_empty() {
            self.close();
        }
        Some(slot)
    }

    pub fn set_ticker(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.ticker.replace(handle) {
            old.abort();
        }
    }

    pub fn track_timer(&mut self, handle: JoinHandle<()>) {
        self.effect_timers.retain(|h| !h.is_finished());
        self.effect_timers.push(handle);
    }

    /// Abort the tick driver and pending reversals. Idempotent.
    pub fn cancel_timers(&mut self) {
        self.epoch += 1;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        for timer in self.effect_timers.drain(..) {
            timer.abort();
        }
    }

    /// Stop everything; the registry entry is about to be dropped
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.cancel_timers();
        self.closed = true;
        debug!(
            room = %self.code,
            age_secs = (Utc::now() - self.created_at).num_seconds(),
            "Session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{CatchConfig, CatchGame};
    use tokio::sync::mpsc;

    use crate::ws::relay::Outbound;

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn types(msgs: &[serde_json::Value]) -> Vec<&str> {
        msgs.iter().map(|m| m["type"].as_str().unwrap()).collect()
    }

    fn session() -> (
        Session<CatchGame>,
        (Uuid, mpsc::Receiver<Outbound>),
        (Uuid, mpsc::Receiver<Outbound>),
    ) {
        let (host, host_rx) = PeerHandle::channel(Uuid::new_v4());
        let (guest, guest_rx) = PeerHandle::channel(Uuid::new_v4());
        let (host_id, guest_id) = (host.player_id, guest.player_id);
        let mut s = Session::new("ABC123".into(), host, &CatchConfig::default(), 42);
        s.fill(guest).unwrap();
        (s, (host_id, host_rx), (guest_id, guest_rx))
    }

    #[test]
    fn fill_notifies_existing_occupant() {
        let (s, (_, mut host_rx), (guest, mut guest_rx)) = session();
        let msgs = drain(&mut host_rx);
        assert_eq!(types(&msgs), ["player_joined"]);
        assert_eq!(msgs[0]["playerId"], guest.to_string());
        let msgs = drain(&mut guest_rx);
        assert_eq!(types(&msgs), ["room_joined"]);
        assert_eq!(msgs[0]["slot"], 2);
        assert_eq!(msgs[0]["roomId"], "ABC123");
        assert_eq!(s.slot_of(guest), Some(Slot::Two));
    }

    #[test]
    fn third_participant_is_rejected() {
        let (mut s, _, _) = session();
        let (extra, _rx) = PeerHandle::channel(Uuid::new_v4());
        assert_eq!(s.fill(extra), Err(RoomError::Full));
    }

    #[test]
    fn only_host_can_start() {
        let (mut s, (host, mut host_rx), (guest, _guest_rx)) = session();
        drain(&mut host_rx);

        assert!(!s.begin_round(guest));
        assert_eq!(s.status(), RoundStatus::Waiting);
        assert!(drain(&mut host_rx).is_empty());

        assert!(s.begin_round(host));
        assert_eq!(s.status(), RoundStatus::Playing);
        assert_eq!(types(&drain(&mut host_rx)), ["game_started"]);

        // Already playing
        assert!(!s.begin_round(host));
    }

    #[test]
    fn start_needs_both_slots() {
        let (host, _rx) = PeerHandle::channel(Uuid::new_v4());
        let host_id = host.player_id;
        let mut s: Session<CatchGame> =
            Session::new("ZZZ999".into(), host, &CatchConfig::default(), 1);
        assert!(!s.begin_round(host_id));
        assert_eq!(s.status(), RoundStatus::Waiting);
    }

    #[test]
    fn advance_broadcasts_state_and_stops_when_not_playing() {
        let (mut s, (host, mut host_rx), (_, mut guest_rx)) = session();
        assert!(s.advance(16.0).is_none());

        s.begin_round(host);
        drain(&mut host_rx);
        drain(&mut guest_rx);

        let outcome = s.advance(16.0).unwrap();
        assert!(!outcome.ended);
        assert_eq!(types(&drain(&mut host_rx)), ["game_state"]);
        assert_eq!(types(&drain(&mut guest_rx)), ["game_state"]);
    }

    #[test]
    fn round_end_sends_state_then_result() {
        let (host_peer, mut host_rx) = PeerHandle::channel(Uuid::new_v4());
        let (guest_peer, _guest_rx) = PeerHandle::channel(Uuid::new_v4());
        let host = host_peer.player_id;
        let config = CatchConfig {
            round_duration_ms: 100.0,
            ..CatchConfig::default()
        };
        let mut s: Session<CatchGame> = Session::new("END000".into(), host_peer, &config, 3);
        s.fill(guest_peer).unwrap();
        s.begin_round(host);
        drain(&mut host_rx);

        let outcome = s.advance(150.0).unwrap();
        assert!(outcome.ended);
        assert_eq!(s.status(), RoundStatus::Ended);
        assert_eq!(types(&drain(&mut host_rx)), ["game_state", "game_ended"]);
        assert!(s.advance(16.0).is_none());
    }

    #[test]
    fn restart_only_from_ended_and_only_by_host() {
        let (mut s, (host, mut host_rx), (guest, mut guest_rx)) = session();
        s.begin_round(host);
        assert!(!s.reset_round(host));

        s.remove_player(guest);
        assert_eq!(s.status(), RoundStatus::Ended);

        let (back, _rx) = PeerHandle::channel(guest);
        s.fill(back).unwrap();
        assert!(!s.reset_round(guest));
        assert_eq!(s.status(), RoundStatus::Ended);

        drain(&mut host_rx);
        drain(&mut guest_rx);
        assert!(s.reset_round(host));
        assert_eq!(s.status(), RoundStatus::Waiting);
        assert_eq!(types(&drain(&mut host_rx)), ["restart_request"]);
    }

    #[test]
    fn leaving_mid_round_forfeits() {
        let (mut s, (host, _host_rx), (guest, mut guest_rx)) = session();
        s.begin_round(host);
        drain(&mut guest_rx);

        assert_eq!(s.remove_player(host), Some(Slot::One));
        assert_eq!(s.status(), RoundStatus::Ended);
        assert!(!s.is_closed());

        let msgs = drain(&mut guest_rx);
        assert_eq!(types(&msgs), ["game_ended", "player_left"]);
        assert_eq!(msgs[0]["winner"], guest.to_string());

        assert_eq!(s.remove_player(guest), Some(Slot::Two));
        assert!(s.is_closed());
        assert_eq!(s.remove_player(guest), None);
    }

    #[test]
    fn cancel_is_idempotent() {
        let (mut s, _, _) = session();
        let before = s.epoch();
        s.cancel_timers();
        s.cancel_timers();
        assert_eq!(s.epoch(), before + 2);
        assert!(!s.has_ticker());
    }
}
