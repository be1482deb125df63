//! Entity records for the arena variant and the aggregate round state

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::physics::Vec2;

/// Player hitbox radius
pub const PLAYER_RADIUS: f32 = 20.0;
/// Pickup hitbox radius
pub const PICKUP_RADIUS: f32 = 15.0;

/// Lifecycle of a round, shared by room and game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Waiting,
    Playing,
    Ended,
}

/// Result of a finished round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Player(Uuid),
    Draw,
}

/// Weapon kinds, in upgrade order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    #[default]
    Laser,
    Shotgun,
    Missile,
    Wave,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 4] = [
        WeaponKind::Laser,
        WeaponKind::Shotgun,
        WeaponKind::Missile,
        WeaponKind::Wave,
    ];

    /// Next weapon in the upgrade cycle, wrapping back to laser
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|w| *w == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Power-up kinds a pickup can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Health,
    WeaponUpgrade,
    SpeedBoost,
    Shield,
}

impl PickupKind {
    pub const ALL: [PickupKind; 4] = [
        PickupKind::Health,
        PickupKind::WeaponUpgrade,
        PickupKind::SpeedBoost,
        PickupKind::Shield,
    ];
}

/// Authoritative player state (arena variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub shield: bool,
    /// Remaining shield time in ms
    pub shield_time: f32,
    pub weapon_type: WeaponKind,
    pub score: u32,
}

impl Player {
    pub fn new(id: Uuid, x: f32, y: f32, max_health: f32, speed: f32) -> Self {
        Self {
            id,
            x,
            y,
            angle: 0.0,
            health: max_health,
            max_health,
            speed,
            shield: false,
            shield_time: 0.0,
            weapon_type: WeaponKind::default(),
            score: 0,
        }
    }

    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Count the shield down; the flag clears when time runs out
    pub fn decay_shield(&mut self, dt_ms: f32) {
        if !self.shield {
            return;
        }
        self.shield_time = (self.shield_time - dt_ms).max(0.0);
        if self.shield_time <= 0.0 {
            self.shield = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub speed: f32,
    pub radius: f32,
    pub damage: f32,
    pub owner_id: Uuid,
    pub weapon_type: WeaponKind,
    pub lifetime: f32,
    pub max_lifetime: f32,
}

impl Projectile {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupItem {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PickupKind,
    pub lifetime: f32,
    pub max_lifetime: f32,
}

impl PickupItem {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Cosmetic particle, carried in snapshots for rendering only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Particle {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub lifetime: f32,
    pub max_lifetime: f32,
    pub color: String,
    pub size: f32,
}

/// Everything the arena tick mutates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    pub players: BTreeMap<Uuid, Player>,
    #[serde(rename = "bullets")]
    pub projectiles: Vec<Projectile>,
    #[serde(rename = "powerUps")]
    pub pickups: Vec<PickupItem>,
    pub particles: Vec<Particle>,
    /// Elapsed round time in ms
    pub game_time: f32,
    #[serde(rename = "gameStatus")]
    pub status: RoundStatus,
    /// Winning player id; null while playing and on a draw
    pub winner: Option<Uuid>,
    pub draw: bool,
}

impl RoundState {
    /// Clear every entity and return to `waiting`
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_result(&mut self, result: Winner) {
        match result {
            Winner::Player(id) => {
                self.winner = Some(id);
                self.draw = false;
            }
            Winner::Draw => {
                self.winner = None;
                self.draw = true;
            }
        }
    }

    /// Result of an ended round
    pub fn result(&self) -> Option<Winner> {
        if self.status != RoundStatus::Ended {
            return None;
        }
        Some(match self.winner {
            Some(id) if !self.draw => Winner::Player(id),
            _ => Winner::Draw,
        })
    }
}
