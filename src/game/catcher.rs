//! Catch variant: two baskets, falling items, score by catches

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::time::{frame_scale, DEFAULT_TICK_MS, REFERENCE_FRAME_MS};

use super::entity::{RoundStatus, Winner};
use super::physics::{CatchBand, PhysicsSystem};
use super::{GameMode, MoveInput, SessionRng, StepOutcome};

/// Item tiers as (value, fall speed px/frame, size px, weight)
const ITEM_TIERS: [(u32, f32, f32, u32); 3] = [
    (1, 3.0, 20.0, 6),
    (3, 4.0, 18.0, 3),
    (5, 5.5, 16.0, 1),
];

#[derive(Debug, Clone)]
pub struct CatchConfig {
    pub width: f32,
    pub height: f32,
    pub catcher_width: f32,
    /// Top edge of the catch band
    pub band_top: f32,
    pub band_height: f32,
    pub round_duration_ms: f32,
    /// One new item every this many ms of round time
    pub spawn_interval_ms: f32,
    /// Items dropped at round start
    pub initial_items: usize,
    pub item_lifetime_ms: f32,
    pub tick_interval: Duration,
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            catcher_width: 100.0,
            band_top: 520.0,
            band_height: 40.0,
            round_duration_ms: 30_000.0,
            spawn_interval_ms: 800.0,
            initial_items: 3,
            item_lifetime_ms: 10_000.0,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catcher {
    pub player_id: Uuid,
    pub slot: u8,
    /// Horizontal centre
    pub x: f32,
    pub width: f32,
    pub score: u32,
}

impl Catcher {
    fn band(&self, config: &CatchConfig) -> CatchBand {
        let half = self.width / 2.0;
        CatchBand {
            top: config.band_top,
            bottom: config.band_top + config.band_height,
            left: self.x - half,
            right: self.x + half,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallingItem {
    pub id: Uuid,
    /// Centre x
    pub x: f32,
    /// Centre y
    pub y: f32,
    pub speed: f32,
    pub size: f32,
    pub value: u32,
    pub lifetime: f32,
    pub max_lifetime: f32,
}

impl FallingItem {
    /// Leading (lower) edge
    pub fn bottom(&self) -> f32 {
        self.y + self.size / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.size / 2.0
    }
}

/// Round state of the catch variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchRound {
    pub catchers: Vec<Catcher>,
    pub items: Vec<FallingItem>,
    pub game_time: f32,
    #[serde(rename = "gameStatus")]
    pub status: RoundStatus,
    /// Winning slot, 0 for a tie or no result yet
    pub winner: u8,
    pub score1: u32,
    pub score2: u32,
    #[serde(skip)]
    spawn_accumulator: f32,
}

pub struct CatchGame {
    config: CatchConfig,
    round: CatchRound,
}

impl CatchGame {
    #[cfg(test)]
    pub fn round(&self) -> &CatchRound {
        &self.round
    }

    #[cfg(test)]
    pub fn round_mut(&mut self) -> &mut CatchRound {
        &mut self.round
    }

    fn spawn_item(&mut self, rng: &mut SessionRng, y: f32) {
        let total: u32 = ITEM_TIERS.iter().map(|t| t.3).sum();
        let mut roll = rng.gen_range(0..total);
        let mut tier = ITEM_TIERS[0];
        for candidate in ITEM_TIERS {
            if roll < candidate.3 {
                tier = candidate;
                break;
            }
            roll -= candidate.3;
        }
        let (value, speed, size, _) = tier;
        let half = size / 2.0;
        let x = if self.config.width > size {
            rng.gen_range(half..self.config.width - half)
        } else {
            self.config.width / 2.0
        };

        self.round.items.push(FallingItem {
            id: Uuid::new_v4(),
            x,
            y,
            speed,
            size,
            value,
            lifetime: self.config.item_lifetime_ms,
            max_lifetime: self.config.item_lifetime_ms,
        });
    }

    /// Items landing in a band are scored. If both bands hold the item, the
    /// catcher whose centre is closer takes it, slot 1 on a tie.
    fn resolve_catches(&mut self) {
        let config = &self.config;
        let CatchRound {
            catchers, items, ..
        } = &mut self.round;

        items.retain(|item| {
            let catcher = catchers
                .iter_mut()
                .filter(|c| PhysicsSystem::band_overlap(item.bottom(), item.x, &c.band(config)))
                .min_by(|a, b| {
                    let da = (a.x - item.x).abs();
                    let db = (b.x - item.x).abs();
                    da.total_cmp(&db).then(a.slot.cmp(&b.slot))
                });

            match catcher {
                Some(catcher) => {
                    catcher.score += item.value;
                    false
                }
                None => true,
            }
        });
        self.sync_scores();
    }

    fn sync_scores(&mut self) {
        let score_of = |slot: u8| {
            self.round
                .catchers
                .iter()
                .find(|c| c.slot == slot)
                .map(|c| c.score)
                .unwrap_or(0)
        };
        let (s1, s2) = (score_of(1), score_of(2));
        self.round.score1 = s1;
        self.round.score2 = s2;
    }

    /// Fall, catch, cull, then spawn for one slice of round time
    fn advance_items(&mut self, dt: f32, rng: &mut SessionRng) {
        let scale = frame_scale(dt);
        for item in &mut self.round.items {
            item.lifetime = (item.lifetime - dt).max(0.0);
            item.y += item.speed * scale;
        }

        self.resolve_catches();

        let floor = self.config.height;
        self.round
            .items
            .retain(|item| item.lifetime > 0.0 && item.top() <= floor);

        if self.config.spawn_interval_ms > 0.0 {
            self.round.spawn_accumulator += dt;
            while self.round.spawn_accumulator >= self.config.spawn_interval_ms {
                self.round.spawn_accumulator -= self.config.spawn_interval_ms;
                self.spawn_item(rng, 0.0);
            }
        }
    }

    fn finish(&mut self, winner_slot: u8) {
        self.round.status = RoundStatus::Ended;
        self.round.winner = winner_slot;
    }
}

impl GameMode for CatchGame {
    type Config = CatchConfig;
    type State = CatchRound;

    const NAME: &'static str = "catch";

    fn new(config: &CatchConfig) -> Self {
        Self {
            config: config.clone(),
            round: CatchRound::default(),
        }
    }

    fn tick_interval(config: &CatchConfig) -> Duration {
        config.tick_interval
    }

    fn status(&self) -> RoundStatus {
        self.round.status
    }

    fn state(&self) -> &CatchRound {
        &self.round
    }

    fn begin(&mut self, slot1: Uuid, slot2: Uuid, rng: &mut SessionRng) {
        self.round = CatchRound::default();
        let width = self.config.catcher_width;
        self.round.catchers = vec![
            Catcher {
                player_id: slot1,
                slot: 1,
                x: self.config.width * 0.25,
                width,
                score: 0,
            },
            Catcher {
                player_id: slot2,
                slot: 2,
                x: self.config.width * 0.75,
                width,
                score: 0,
            },
        ];
        // Stagger the opening wave so it doesn't land all at once
        for i in 0..self.config.initial_items {
            self.spawn_item(rng, -(i as f32) * 120.0);
        }
        self.round.status = RoundStatus::Playing;
    }

    fn reset(&mut self) {
        self.round = CatchRound::default();
    }

    fn step(&mut self, dt_ms: f32, rng: &mut SessionRng) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if self.round.status != RoundStatus::Playing {
            return outcome;
        }

        let dt = dt_ms.max(0.0);
        self.round.game_time += dt;

        // Items move at most one reference frame between band checks,
        // so a coarse tick can't carry them past a 40px band.
        let mut remaining = dt;
        while remaining > 0.0 {
            let sub = remaining.min(REFERENCE_FRAME_MS);
            remaining -= sub;
            self.advance_items(sub, rng);
        }

        if self.round.game_time >= self.config.round_duration_ms {
            let winner = match self.round.score1.cmp(&self.round.score2) {
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Less => 2,
                std::cmp::Ordering::Equal => 0,
            };
            self.finish(winner);
            outcome.ended = true;
        }

        outcome
    }

    fn apply_move(&mut self, player_id: Uuid, input: MoveInput) -> bool {
        if self.round.status != RoundStatus::Playing || !input.x.is_finite() {
            return false;
        }
        let max_x = self.config.width;
        let Some(catcher) = self
            .round
            .catchers
            .iter_mut()
            .find(|c| c.player_id == player_id)
        else {
            return false;
        };
        let half = catcher.width / 2.0;
        catcher.x = input.x.clamp(half, (max_x - half).max(half));
        true
    }

    fn forfeit(&mut self, leaver: Uuid) -> bool {
        let remaining = self
            .round
            .catchers
            .iter()
            .find(|c| c.player_id != leaver)
            .map(|c| c.slot);
        self.round.catchers.retain(|c| c.player_id != leaver);

        if self.round.status != RoundStatus::Playing {
            return false;
        }
        self.finish(remaining.unwrap_or(0));
        true
    }

    fn winner(&self) -> Option<Winner> {
        if self.round.status != RoundStatus::Ended {
            return None;
        }
        let winner = self
            .round
            .catchers
            .iter()
            .find(|c| c.slot == self.round.winner)
            .map(|c| Winner::Player(c.player_id))
            .unwrap_or(Winner::Draw);
        Some(winner)
    }
}
