//! Registry of live rooms for one game variant

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::{GameMode, MoveInput, RoundStatus, ScheduledReversal};
use crate::util::time::TickClock;
use crate::ws::protocol::ServerMsg;
use crate::ws::relay::PeerHandle;

use super::code;
use super::session::{Session, SharedSession, Slot};
use super::RoomError;

/// A connection's back-reference to the room it occupies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    pub code: String,
    pub slot: Slot,
    pub player_id: Uuid,
}

pub struct RoomManager<M: GameMode> {
    sessions: DashMap<String, SharedSession<M>>,
    config: M::Config,
    tick_interval: Duration,
}

impl<M: GameMode> RoomManager<M> {
    pub fn new(config: M::Config) -> Self {
        let tick_interval = M::tick_interval(&config);
        Self {
            sessions: DashMap::new(),
            config,
            tick_interval,
        }
    }

    pub fn room_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn status(&self, code: &str) -> Option<RoundStatus> {
        self.session(code).map(|s| s.lock().status())
    }

    pub(crate) fn session(&self, code: &str) -> Option<SharedSession<M>> {
        self.sessions.get(&code::normalize(code)).map(|s| s.clone())
    }

    /// Open a room with `peer` in slot 1 and confirm it to them
    pub fn create_room(&self, peer: PeerHandle) -> SessionRef {
        let player_id = peer.player_id;
        let mut rng = rand::thread_rng();
        let seed = rand::random::<u64>();

        loop {
            let code = code::generate(&mut rng);
            if let Entry::Vacant(slot) = self.sessions.entry(code.clone()) {
                peer.send(&ServerMsg::RoomCreated {
                    room_id: code.clone(),
                    player_id,
                    slot: Slot::One.number(),
                });
                let session = Session::new(code.clone(), peer, &self.config, seed);
                slot.insert(Arc::new(Mutex::new(session)));
                info!(room = %code, mode = M::NAME, player_id = %player_id, "Room created");
                return SessionRef {
                    code,
                    slot: Slot::One,
                    player_id,
                };
            }
            debug!(room = %code, "Room code collision, regenerating");
        }
    }

    pub fn join_room(&self, code: &str, peer: PeerHandle) -> Result<SessionRef, RoomError> {
        let session = self.session(code).ok_or(RoomError::NotFound)?;
        let player_id = peer.player_id;

        let mut guard = session.lock();
        let slot = guard.fill(peer)?;
        let code = guard.code().to_string();
        drop(guard);

        info!(
            room = %code,
            mode = M::NAME,
            player_id = %player_id,
            slot = slot.number(),
            "Player joined room"
        );
        Ok(SessionRef {
            code,
            slot,
            player_id,
        })
    }

    /// Begin the round and its tick driver. Ignored unless permitted.
    pub fn start_game(&self, at: &SessionRef) -> bool {
        let Some(session) = self.session(&at.code) else {
            return false;
        };
        let mut guard = session.lock();
        if !guard.begin_round(at.player_id) {
            debug!(room = %at.code, player_id = %at.player_id, "Start request ignored");
            return false;
        }
        let handle = spawn_ticker(session.clone(), self.tick_interval, guard.epoch());
        guard.set_ticker(handle);
        true
    }

    pub fn restart_game(&self, at: &SessionRef) -> bool {
        self.session(&at.code)
            .map(|s| s.lock().reset_round(at.player_id))
            .unwrap_or(false)
    }

    pub fn handle_move(&self, at: &SessionRef, input: MoveInput) {
        if let Some(session) = self.session(&at.code) {
            session.lock().handle_move(at.player_id, input);
        }
    }

    pub fn handle_shoot(&self, at: &SessionRef, angle: f32) {
        if let Some(session) = self.session(&at.code) {
            session.lock().handle_shoot(at.player_id, angle);
        }
    }

    /// Connection went away. Empty rooms are torn down before removal.
    pub fn leave(&self, at: &SessionRef) {
        let Some(session) = self.session(&at.code) else {
            return;
        };
        let closed = {
            let mut guard = session.lock();
            guard.remove_player(at.player_id);
            guard.is_closed()
        };
        info!(room = %at.code, player_id = %at.player_id, "Player left room");

        if closed {
            self.sessions
                .remove_if(&at.code, |_, s| Arc::ptr_eq(s, &session));
            info!(room = %at.code, mode = M::NAME, "Room removed");
        }
    }
}

/// Drive `session` every `period` until the round stops or the epoch moves on
fn spawn_ticker<M: GameMode>(
    session: SharedSession<M>,
    period: Duration,
    epoch: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = TickClock::new();

        loop {
            ticker.tick().await;
            let dt = clock.lap_ms();

            let mut guard = session.lock();
            if guard.epoch() != epoch {
                break;
            }
            let Some(outcome) = guard.advance(dt) else {
                break;
            };
            // The round's timers were already cancelled
            if outcome.ended {
                break;
            }
            for reversal in outcome.reversals {
                let handle = spawn_reversal(session.clone(), reversal, epoch);
                guard.track_timer(handle);
            }
        }
    })
}

fn spawn_reversal<M: GameMode>(
    session: SharedSession<M>,
    scheduled: ScheduledReversal,
    epoch: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(scheduled.after).await;
        let mut guard = session.lock();
        if guard.epoch() == epoch {
            guard.apply_reversal(scheduled.player_id, scheduled.reversal);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::EffectReversal;
    use crate::game::entity::{PickupItem, PickupKind};
    use crate::game::{ArenaConfig, ArenaGame, CatchConfig, CatchGame};
    use crate::ws::relay::Outbound;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
            out.push(v["type"].as_str().unwrap().to_string());
        }
        out
    }

    fn catch_manager(round_ms: f32) -> RoomManager<CatchGame> {
        RoomManager::new(CatchConfig {
            round_duration_ms: round_ms,
            ..CatchConfig::default()
        })
    }

    fn arena_manager() -> RoomManager<ArenaGame> {
        RoomManager::new(ArenaConfig {
            powerup_spawn_rate: 0.0,
            ..ArenaConfig::default()
        })
    }

    fn arena_room(rooms: &RoomManager<ArenaGame>) -> SessionRef {
        let (host, _) = PeerHandle::channel(Uuid::new_v4());
        let at = rooms.create_room(host);
        let (guest, _) = PeerHandle::channel(Uuid::new_v4());
        rooms.join_room(&at.code, guest).unwrap();
        at
    }

    /// Place a speed boost on slot 1's spawn point
    fn drop_speed_boost(rooms: &RoomManager<ArenaGame>, at: &SessionRef) {
        let session = rooms.session(&at.code).unwrap();
        session.lock().game_mut().round_mut().pickups.push(PickupItem {
            id: Uuid::new_v4(),
            x: 100.0,
            y: 300.0,
            kind: PickupKind::SpeedBoost,
            lifetime: 10_000.0,
            max_lifetime: 10_000.0,
        });
    }

    fn speed_of(rooms: &RoomManager<ArenaGame>, at: &SessionRef) -> f32 {
        let session = rooms.session(&at.code).unwrap();
        let mut guard = session.lock();
        guard.game_mut().round().players[&at.player_id].speed
    }

    #[test]
    fn join_lookup_is_case_insensitive() {
        let rooms = catch_manager(30_000.0);
        let (host, _h) = PeerHandle::channel(Uuid::new_v4());
        let created = rooms.create_room(host);

        let (guest, _g) = PeerHandle::channel(Uuid::new_v4());
        let joined = assert_ok!(rooms.join_room(&created.code.to_lowercase(), guest));
        assert_eq!(joined.code, created.code);
        assert_eq!(joined.slot, Slot::Two);
    }

    #[test]
    fn join_errors() {
        let rooms = catch_manager(30_000.0);
        let (p, _rx) = PeerHandle::channel(Uuid::new_v4());
        assert_eq!(assert_err!(rooms.join_room("NOPE00", p)), RoomError::NotFound);

        let (host, _h) = PeerHandle::channel(Uuid::new_v4());
        let created = rooms.create_room(host);
        let (guest, _g) = PeerHandle::channel(Uuid::new_v4());
        rooms.join_room(&created.code, guest).unwrap();
        let (third, _t) = PeerHandle::channel(Uuid::new_v4());
        assert_eq!(rooms.join_room(&created.code, third), Err(RoomError::Full));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_noop_until_second_player_joins() {
        let rooms = catch_manager(30_000.0);
        let (host, mut host_rx) = PeerHandle::channel(Uuid::new_v4());
        let at = rooms.create_room(host);

        assert!(!rooms.start_game(&at));
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Waiting));

        let (guest, _g) = PeerHandle::channel(Uuid::new_v4());
        rooms.join_room(&at.code, guest).unwrap();
        assert!(rooms.start_game(&at));
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Playing));
        assert_eq!(
            drain(&mut host_rx),
            ["room_created", "player_joined", "game_started"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_broadcasts_until_round_ends() {
        let rooms = catch_manager(200.0);
        let (host, mut host_rx) = PeerHandle::channel(Uuid::new_v4());
        let at = rooms.create_room(host);
        let (guest, mut guest_rx) = PeerHandle::channel(Uuid::new_v4());
        rooms.join_room(&at.code, guest).unwrap();
        rooms.start_game(&at);
        drain(&mut host_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let mid = drain(&mut guest_rx);
        assert!(mid.iter().filter(|t| *t == "game_state").count() >= 3);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let rest = drain(&mut host_rx);
        assert_eq!(rest.last().map(String::as_str), Some("game_ended"));
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Ended));

        let session = rooms.session(&at.code).unwrap();
        assert!(!session.lock().has_ticker());

        // Nothing more once ended
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(drain(&mut host_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn host_disconnect_keeps_room_until_guest_leaves() {
        let rooms: RoomManager<ArenaGame> = RoomManager::new(ArenaConfig::default());
        let (host, _h) = PeerHandle::channel(Uuid::new_v4());
        let at = rooms.create_room(host);
        let (guest, mut guest_rx) = PeerHandle::channel(Uuid::new_v4());
        let guest_at = rooms.join_room(&at.code, guest).unwrap();
        rooms.start_game(&at);
        tokio::time::sleep(Duration::from_millis(50)).await;
        drain(&mut guest_rx);

        rooms.leave(&at);
        assert_eq!(rooms.room_count(), 1);
        let msgs = drain(&mut guest_rx);
        assert!(msgs.contains(&"player_left".to_string()));

        let session = rooms.session(&at.code).unwrap();
        rooms.leave(&guest_at);
        assert_eq!(rooms.room_count(), 0);
        assert!(session.lock().is_closed());
        assert!(!session.lock().has_ticker());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_then_start_runs_a_new_driver() {
        let rooms = catch_manager(100.0);
        let (host, _h) = PeerHandle::channel(Uuid::new_v4());
        let at = rooms.create_room(host);
        let (guest, _g) = PeerHandle::channel(Uuid::new_v4());
        let guest_at = rooms.join_room(&at.code, guest).unwrap();

        rooms.start_game(&at);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Ended));

        assert!(!rooms.restart_game(&guest_at));
        assert!(rooms.restart_game(&at));
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Waiting));

        assert!(rooms.start_game(&at));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Playing));
    }

    #[tokio::test(start_paused = true)]
    async fn speed_boost_wears_off_after_ten_seconds() {
        let rooms = arena_manager();
        let at = arena_room(&rooms);
        assert!(rooms.start_game(&at));
        drop_speed_boost(&rooms, &at);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(speed_of(&rooms, &at), 4.5);

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(speed_of(&rooms, &at), 4.5);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(speed_of(&rooms, &at), 3.0);
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Playing));
        let session = rooms.session(&at.code).unwrap();
        assert_eq!(session.lock().pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_discards_reversal_from_previous_round() {
        let rooms = arena_manager();
        let at = arena_room(&rooms);
        let session = rooms.session(&at.code).unwrap();

        rooms.start_game(&at);
        drop_speed_boost(&rooms, &at);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(speed_of(&rooms, &at), 4.5);
        let first_epoch = session.lock().epoch();

        session.lock().game_mut().round_mut().game_time = 180_000.0;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rooms.status(&at.code), Some(RoundStatus::Ended));
        assert!(rooms.restart_game(&at));
        assert!(rooms.start_game(&at));
        assert!(session.lock().epoch() > first_epoch);

        // Boost again midway so a stale restore would show up early
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(speed_of(&rooms, &at), 3.0);
        drop_speed_boost(&rooms, &at);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(speed_of(&rooms, &at), 4.5);

        // Past the first round's restore time
        tokio::time::sleep(Duration::from_millis(7_000)).await;
        assert_eq!(speed_of(&rooms, &at), 4.5);

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        assert_eq!(speed_of(&rooms, &at), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reversal_with_stale_epoch_is_ignored() {
        let rooms = arena_manager();
        let at = arena_room(&rooms);
        rooms.start_game(&at);
        let session = rooms.session(&at.code).unwrap();
        let stale = session.lock().epoch() - 1;

        let handle = spawn_reversal(
            session.clone(),
            ScheduledReversal {
                player_id: at.player_id,
                reversal: EffectReversal::RestoreSpeed { multiplier: 1.5 },
                after: Duration::from_millis(100),
            },
            stale,
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handle.is_finished());
        assert_eq!(speed_of(&rooms, &at), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn ending_tick_schedules_no_reversal() {
        let rooms = arena_manager();
        let at = arena_room(&rooms);
        rooms.start_game(&at);
        let session = rooms.session(&at.code).unwrap();

        // Boost is collected on the same tick the clock runs out
        drop_speed_boost(&rooms, &at);
        session.lock().game_mut().round_mut().game_time = 180_000.0 - 1.0;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let guard = session.lock();
        assert_eq!(guard.status(), RoundStatus::Ended);
        assert!(!guard.has_ticker());
        assert_eq!(guard.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn move_is_echoed_to_opponent_only() {
        let rooms = catch_manager(30_000.0);
        let (host, mut host_rx) = PeerHandle::channel(Uuid::new_v4());
        let at = rooms.create_room(host);
        let (guest, mut guest_rx) = PeerHandle::channel(Uuid::new_v4());
        rooms.join_room(&at.code, guest).unwrap();
        rooms.start_game(&at);
        drain(&mut host_rx);
        drain(&mut guest_rx);

        rooms.handle_move(
            &at,
            MoveInput {
                x: 300.0,
                ..MoveInput::default()
            },
        );
        assert!(drain(&mut host_rx).is_empty());
        assert_eq!(drain(&mut guest_rx), ["game_state"]);
    }
}
