//! Arena variant: two shooters, power-ups, authoritative tick

use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use crate::util::time::{frame_scale, DEFAULT_TICK_MS};

use super::combat::{CombatSystem, EffectReversal, HitResult, PowerUpEffect, KILL_BONUS};
use super::entity::{
    Particle, PickupItem, PickupKind, Player, RoundState, RoundStatus, Winner, PICKUP_RADIUS,
    PLAYER_RADIUS,
};
use super::physics::{PhysicsSystem, Vec2, WorldBounds};
use super::{GameMode, MoveInput, ScheduledReversal, SessionRng, StepOutcome};

const PICKUP_LIFETIME_MS: f32 = 10_000.0;
/// Pickups never spawn closer than this to the world edge
const PICKUP_SPAWN_MARGIN: f32 = 50.0;
/// Distance of each spawn point from its side wall
const SPAWN_INSET: f32 = 100.0;

const HIT_PARTICLES: usize = 5;
const HIT_PARTICLE_LIFETIME_MS: f32 = 500.0;
const HIT_PARTICLE_COLOR: &str = "#FF0000";

/// Tunables for the arena variant
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
    pub player_speed: f32,
    pub max_health: f32,
    /// Round length in ms before the score decides
    pub round_duration_ms: f32,
    /// Chance per tick of a pickup appearing
    pub powerup_spawn_rate: f64,
    /// Health-based endings are not checked before this much round time (ms)
    pub grace_period_ms: f32,
    pub tick_interval: Duration,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            player_speed: 3.0,
            max_health: 100.0,
            round_duration_ms: 180_000.0,
            powerup_spawn_rate: 0.001,
            grace_period_ms: 1000.0,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

impl ArenaConfig {
    pub fn bounds(&self) -> WorldBounds {
        WorldBounds::new(self.width, self.height)
    }
}

/// The authoritative arena round
pub struct ArenaGame {
    config: ArenaConfig,
    state: RoundState,
}

impl ArenaGame {
    #[cfg(test)]
    pub fn round(&self) -> &RoundState {
        &self.state
    }

    #[cfg(test)]
    pub fn round_mut(&mut self) -> &mut RoundState {
        &mut self.state
    }

    fn decay_timers(&mut self, dt: f32) {
        for player in self.state.players.values_mut() {
            player.decay_shield(dt);
        }
        for projectile in &mut self.state.projectiles {
            projectile.lifetime = (projectile.lifetime - dt).max(0.0);
        }
        for pickup in &mut self.state.pickups {
            pickup.lifetime = (pickup.lifetime - dt).max(0.0);
        }
        for particle in &mut self.state.particles {
            particle.lifetime = (particle.lifetime - dt).max(0.0);
        }
    }

    fn integrate(&mut self, dt: f32) {
        let scale = frame_scale(dt);
        for projectile in &mut self.state.projectiles {
            projectile.x += projectile.vx * scale;
            projectile.y += projectile.vy * scale;
        }
        for particle in &mut self.state.particles {
            particle.x += particle.vx * scale;
            particle.y += particle.vy * scale;
        }
    }

    fn cull(&mut self) {
        let bounds = self.config.bounds();
        self.state
            .projectiles
            .retain(|p| p.lifetime > 0.0 && !PhysicsSystem::is_out_of_bounds(p.pos(), &bounds));
        self.state.pickups.retain(|p| p.lifetime > 0.0);
        self.state.particles.retain(|p| p.lifetime > 0.0);
    }

    /// Projectiles against every live non-owner. A projectile is consumed by
    /// the first player it touches, shielded or not.
    fn resolve_projectile_hits(&mut self, rng: &mut SessionRng) {
        let RoundState {
            players,
            projectiles,
            particles,
            ..
        } = &mut self.state;
        let mut killers: Vec<Uuid> = Vec::new();

        projectiles.retain(|projectile| {
            let target = players.values_mut().find(|player| {
                player.id != projectile.owner_id
                    && player.is_alive()
                    && PhysicsSystem::circles_overlap(
                        player.pos(),
                        PLAYER_RADIUS,
                        projectile.pos(),
                        projectile.radius,
                    )
            });

            let Some(target) = target else {
                return true;
            };

            let hit = HitResult::resolve(target, projectile.damage);
            if hit.target_killed {
                killers.push(projectile.owner_id);
            }
            particles.extend(hit_particles(projectile.pos(), rng));
            false
        });

        for killer_id in killers {
            if let Some(killer) = players.get_mut(&killer_id) {
                killer.score += KILL_BONUS;
            }
        }
    }

    fn resolve_pickups(&mut self, outcome: &mut StepOutcome) {
        let RoundState {
            players, pickups, ..
        } = &mut self.state;

        pickups.retain(|pickup| {
            let collector = players.values_mut().find(|player| {
                player.is_alive()
                    && PhysicsSystem::circles_overlap(
                        player.pos(),
                        PLAYER_RADIUS,
                        pickup.pos(),
                        PICKUP_RADIUS,
                    )
            });

            let Some(player) = collector else {
                return true;
            };

            let effect = PowerUpEffect::for_pickup(pickup.kind);
            *player = effect.apply(player.clone());
            if let Some((reversal, after)) = effect.reversal() {
                outcome.reversals.push(ScheduledReversal {
                    player_id: player.id,
                    reversal,
                    after,
                });
            }
            false
        });
    }

    fn maybe_spawn_pickup(&mut self, rng: &mut SessionRng) {
        let rate = self.config.powerup_spawn_rate.clamp(0.0, 1.0);
        if !rng.gen_bool(rate) {
            return;
        }

        let x = random_in(rng, PICKUP_SPAWN_MARGIN, self.config.width - PICKUP_SPAWN_MARGIN);
        let y = random_in(rng, PICKUP_SPAWN_MARGIN, self.config.height - PICKUP_SPAWN_MARGIN);
        let kind = PickupKind::ALL[rng.gen_range(0..PickupKind::ALL.len())];

        self.state.pickups.push(PickupItem {
            id: Uuid::new_v4(),
            x,
            y,
            kind,
            lifetime: PICKUP_LIFETIME_MS,
            max_lifetime: PICKUP_LIFETIME_MS,
        });
    }

    /// Health-based endings first, then the round clock
    fn evaluate_end(&mut self) -> bool {
        if self.state.game_time >= self.config.grace_period_ms && self.state.players.len() >= 2 {
            let alive: Vec<Uuid> = self
                .state
                .players
                .values()
                .filter(|p| p.is_alive())
                .map(|p| p.id)
                .collect();

            match alive.as_slice() {
                [survivor] => {
                    self.finish(Winner::Player(*survivor));
                    return true;
                }
                [] => {
                    self.finish(Winner::Draw);
                    return true;
                }
                _ => {}
            }
        }

        if self.state.game_time >= self.config.round_duration_ms {
            let winner = self.score_leader();
            self.finish(winner);
            return true;
        }

        false
    }

    /// Player with a strictly higher score than everyone else, otherwise a draw
    fn score_leader(&self) -> Winner {
        let mut ranked: Vec<&Player> = self.state.players.values().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        match ranked.as_slice() {
            [] => Winner::Draw,
            [only] => Winner::Player(only.id),
            [first, second, ..] if first.score > second.score => Winner::Player(first.id),
            _ => Winner::Draw,
        }
    }

    fn finish(&mut self, winner: Winner) {
        self.state.status = RoundStatus::Ended;
        self.state.set_result(winner);
    }
}

impl GameMode for ArenaGame {
    type Config = ArenaConfig;
    type State = RoundState;

    const NAME: &'static str = "arena";

    fn new(config: &ArenaConfig) -> Self {
        Self {
            config: config.clone(),
            state: RoundState::default(),
        }
    }

    fn tick_interval(config: &ArenaConfig) -> Duration {
        config.tick_interval
    }

    fn status(&self) -> RoundStatus {
        self.state.status
    }

    fn state(&self) -> &RoundState {
        &self.state
    }

    fn begin(&mut self, slot1: Uuid, slot2: Uuid, _rng: &mut SessionRng) {
        self.state.reset();
        let mid_y = self.config.height / 2.0;
        let spawns = [
            (slot1, SPAWN_INSET),
            (slot2, self.config.width - SPAWN_INSET),
        ];
        for (id, x) in spawns {
            let player = Player::new(
                id,
                x,
                mid_y,
                self.config.max_health,
                self.config.player_speed,
            );
            self.state.players.insert(id, player);
        }
        self.state.status = RoundStatus::Playing;
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn step(&mut self, dt_ms: f32, rng: &mut SessionRng) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if self.state.status != RoundStatus::Playing {
            return outcome;
        }

        let dt = dt_ms.max(0.0);
        self.state.game_time += dt;

        self.decay_timers(dt);
        self.integrate(dt);
        self.cull();
        self.resolve_projectile_hits(rng);
        self.resolve_pickups(&mut outcome);
        self.maybe_spawn_pickup(rng);
        outcome.ended = self.evaluate_end();

        outcome
    }

    fn apply_move(&mut self, player_id: Uuid, input: MoveInput) -> bool {
        if self.state.status != RoundStatus::Playing {
            return false;
        }
        let bounds = self.config.bounds();
        let Some(player) = self.state.players.get_mut(&player_id) else {
            return false;
        };
        let pos = PhysicsSystem::clamp_to_bounds(Vec2::new(input.x, input.y), &bounds);
        player.x = pos.x;
        player.y = pos.y;
        if input.angle.is_finite() {
            player.angle = input.angle;
        }
        true
    }

    fn apply_shoot(&mut self, player_id: Uuid, angle: f32) -> bool {
        if self.state.status != RoundStatus::Playing || !angle.is_finite() {
            return false;
        }
        let Some(shooter) = self.state.players.get(&player_id) else {
            return false;
        };
        if !shooter.is_alive() {
            return false;
        }
        let volley = CombatSystem::fire(player_id, shooter.pos(), angle, shooter.weapon_type);
        self.state.projectiles.extend(volley);
        true
    }

    fn apply_reversal(&mut self, player_id: Uuid, reversal: EffectReversal) {
        if self.state.status != RoundStatus::Playing {
            return;
        }
        if let Some(player) = self.state.players.get_mut(&player_id) {
            *player = reversal.apply(player.clone());
        }
    }

    fn forfeit(&mut self, leaver: Uuid) -> bool {
        self.state.players.remove(&leaver);
        self.state.projectiles.retain(|p| p.owner_id != leaver);

        if self.state.status != RoundStatus::Playing {
            return false;
        }
        let winner = match self.state.players.keys().next() {
            Some(remaining) => Winner::Player(*remaining),
            None => Winner::Draw,
        };
        self.finish(winner);
        true
    }

    fn winner(&self) -> Option<Winner> {
        self.state.result()
    }
}

fn random_in(rng: &mut SessionRng, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    rng.gen_range(min..max)
}

fn hit_particles(at: Vec2, rng: &mut SessionRng) -> Vec<Particle> {
    (0..HIT_PARTICLES)
        .map(|_| Particle {
            id: Uuid::new_v4(),
            x: at.x,
            y: at.y,
            vx: rng.gen_range(-2.0..2.0),
            vy: rng.gen_range(-2.0..2.0),
            lifetime: HIT_PARTICLE_LIFETIME_MS,
            max_lifetime: HIT_PARTICLE_LIFETIME_MS,
            color: HIT_PARTICLE_COLOR.to_string(),
            size: rng.gen_range(2.0..5.0),
        })
        .collect()
}
