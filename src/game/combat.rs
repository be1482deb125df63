//! Combat system - weapons, damage, power-up effects

use std::time::Duration;

use uuid::Uuid;

use super::entity::{PickupKind, Player, Projectile, WeaponKind};
use super::physics::Vec2;

/// Score awarded for the hit that drops an opponent to zero health
pub const KILL_BONUS: u32 = 100;
/// Health restored by a health pickup
pub const HEAL_AMOUNT: f32 = 50.0;
pub const SPEED_BOOST_MULTIPLIER: f32 = 1.5;
pub const SPEED_BOOST_DURATION: Duration = Duration::from_secs(10);
pub const SHIELD_DURATION_MS: f32 = 5000.0;

const SHOTGUN_PELLETS: usize = 5;
const SHOTGUN_SPREAD: f32 = std::f32::consts::PI / 6.0;

/// Weapon stats per weapon kind
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Projectile speed in pixels per reference frame
    pub speed: f32,
    /// Damage per hit
    pub damage: f32,
    /// Projectile lifetime (ms)
    pub lifetime_ms: f32,
    /// Projectile hitbox radius
    pub radius: f32,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Laser => Self {
                speed: 8.0,
                damage: 10.0,
                lifetime_ms: 2000.0,
                radius: 4.0,
            },
            WeaponKind::Shotgun => Self {
                speed: 6.0,
                damage: 15.0,
                lifetime_ms: 1500.0,
                radius: 6.0,
            },
            WeaponKind::Missile => Self {
                speed: 5.0,
                damage: 25.0,
                lifetime_ms: 3000.0,
                radius: 8.0,
            },
            WeaponKind::Wave => Self {
                speed: 4.0,
                damage: 20.0,
                lifetime_ms: 2500.0,
                radius: 10.0,
            },
        }
    }
}

impl Projectile {
    /// Create a single projectile travelling along `direction`
    pub fn new(owner_id: Uuid, origin: Vec2, direction: f32, kind: WeaponKind) -> Self {
        let stats = WeaponStats::for_kind(kind);
        let vel = Vec2::from_angle(direction).scale(stats.speed);
        Self {
            id: Uuid::new_v4(),
            x: origin.x,
            y: origin.y,
            vx: vel.x,
            vy: vel.y,
            angle: direction,
            speed: stats.speed,
            radius: stats.radius,
            damage: stats.damage,
            owner_id,
            weapon_type: kind,
            lifetime: stats.lifetime_ms,
            max_lifetime: stats.lifetime_ms,
        }
    }
}

/// Combat rules that don't need the whole round
pub struct CombatSystem;

impl CombatSystem {
    /// Projectiles produced by one trigger pull. The shotgun fans out
    /// evenly across its spread, every other weapon fires straight.
    pub fn fire(owner_id: Uuid, origin: Vec2, direction: f32, kind: WeaponKind) -> Vec<Projectile> {
        match kind {
            WeaponKind::Shotgun => {
                let step = SHOTGUN_SPREAD / (SHOTGUN_PELLETS - 1) as f32;
                let half = (SHOTGUN_PELLETS - 1) as f32 / 2.0;
                (0..SHOTGUN_PELLETS)
                    .map(|i| {
                        let offset = (i as f32 - half) * step;
                        Projectile::new(owner_id, origin, direction + offset, kind)
                    })
                    .collect()
            }
            _ => vec![Projectile::new(owner_id, origin, direction, kind)],
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}

/// Outcome of a projectile hitting a player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub damage_dealt: f32,
    pub target_killed: bool,
}

impl HitResult {
    /// Resolve a hit against `target`; shields absorb everything
    pub fn resolve(target: &mut Player, damage: f32) -> Self {
        if target.shield {
            return Self {
                damage_dealt: 0.0,
                target_killed: false,
            };
        }
        let before = target.health;
        let (new_health, killed) = CombatSystem::apply_damage(target.health, damage);
        target.health = new_health;
        Self {
            damage_dealt: before - new_health,
            target_killed: killed,
        }
    }
}

/// Effect granted by collecting a pickup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerUpEffect {
    Heal(f32),
    UpgradeWeapon,
    SpeedBoost { multiplier: f32, duration: Duration },
    Shield { duration_ms: f32 },
}

/// Undo step for a temporary effect, applied by a scheduled task
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectReversal {
    RestoreSpeed { multiplier: f32 },
}

impl EffectReversal {
    pub fn apply(self, mut player: Player) -> Player {
        match self {
            EffectReversal::RestoreSpeed { multiplier } => {
                player.speed /= multiplier;
            }
        }
        player
    }
}

impl PowerUpEffect {
    pub fn for_pickup(kind: PickupKind) -> Self {
        match kind {
            PickupKind::Health => PowerUpEffect::Heal(HEAL_AMOUNT),
            PickupKind::WeaponUpgrade => PowerUpEffect::UpgradeWeapon,
            PickupKind::SpeedBoost => PowerUpEffect::SpeedBoost {
                multiplier: SPEED_BOOST_MULTIPLIER,
                duration: SPEED_BOOST_DURATION,
            },
            PickupKind::Shield => PowerUpEffect::Shield {
                duration_ms: SHIELD_DURATION_MS,
            },
        }
    }

    pub fn apply(self, mut player: Player) -> Player {
        match self {
            PowerUpEffect::Heal(amount) => {
                player.health = (player.health + amount).min(player.max_health);
            }
            PowerUpEffect::UpgradeWeapon => {
                player.weapon_type = player.weapon_type.next();
            }
            PowerUpEffect::SpeedBoost { multiplier, .. } => {
                player.speed *= multiplier;
            }
            PowerUpEffect::Shield { duration_ms } => {
                player.shield = true;
                player.shield_time = duration_ms;
            }
        }
        player
    }

    /// Reversal to schedule for temporary effects
    pub fn reversal(self) -> Option<(EffectReversal, Duration)> {
        match self {
            PowerUpEffect::SpeedBoost {
                multiplier,
                duration,
            } => Some((EffectReversal::RestoreSpeed { multiplier }, duration)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(Uuid::new_v4(), 100.0, 300.0, 100.0, 3.0)
    }

    #[test]
    fn shield_absorbs_damage() {
        let mut p = player();
        p.shield = true;
        let hit = HitResult::resolve(&mut p, 25.0);
        assert_eq!(p.health, 100.0);
        assert!(!hit.target_killed);
        assert_eq!(hit.damage_dealt, 0.0);
    }

    #[test]
    fn damage_floors_at_zero() {
        let mut p = player();
        p.health = 5.0;
        let hit = HitResult::resolve(&mut p, 10.0);
        assert_eq!(p.health, 0.0);
        assert!(hit.target_killed);
        assert_eq!(hit.damage_dealt, 5.0);
    }

    #[test]
    fn heal_is_capped() {
        let mut p = player();
        p.health = 80.0;
        let p = PowerUpEffect::for_pickup(PickupKind::Health).apply(p);
        assert_eq!(p.health, 100.0);
    }

    #[test]
    fn speed_boost_reverts_exactly() {
        let p = player();
        let effect = PowerUpEffect::for_pickup(PickupKind::SpeedBoost);
        let boosted = effect.apply(p.clone());
        assert_eq!(boosted.speed, 4.5);

        let (reversal, after) = effect.reversal().expect("speed boost is temporary");
        assert_eq!(after, SPEED_BOOST_DURATION);
        assert_eq!(reversal.apply(boosted).speed, p.speed);
    }

    #[test]
    fn permanent_effects_have_no_reversal() {
        for kind in [PickupKind::Health, PickupKind::WeaponUpgrade, PickupKind::Shield] {
            assert!(PowerUpEffect::for_pickup(kind).reversal().is_none());
        }
    }

    #[test]
    fn shield_pickup_sets_timer() {
        let p = PowerUpEffect::for_pickup(PickupKind::Shield).apply(player());
        assert!(p.shield);
        assert_eq!(p.shield_time, SHIELD_DURATION_MS);
    }

    #[test]
    fn shotgun_fans_out() {
        let owner = Uuid::new_v4();
        let shots = CombatSystem::fire(owner, Vec2::new(0.0, 0.0), 0.0, WeaponKind::Shotgun);
        assert_eq!(shots.len(), SHOTGUN_PELLETS);
        assert!((shots[0].angle + SHOTGUN_SPREAD / 2.0).abs() < 1e-5);
        assert!((shots[4].angle - SHOTGUN_SPREAD / 2.0).abs() < 1e-5);
        assert!(shots.iter().all(|s| s.owner_id == owner && s.damage == 15.0));
    }

    #[test]
    fn laser_fires_single_projectile() {
        let shots = CombatSystem::fire(Uuid::new_v4(), Vec2::new(1.0, 2.0), 0.0, WeaponKind::Laser);
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].vx, 8.0);
        assert_eq!(shots[0].lifetime, 2000.0);
    }
}
