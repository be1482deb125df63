//! Collision predicates and vector helpers

use serde::{Deserialize, Serialize};

/// 2D vector used for positions and velocities
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians)
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

/// Rectangular play area anchored at the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Horizontal catch zone of a catcher: a vertical band plus a horizontal span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatchBand {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

/// Stateless collision and geometry helpers
pub struct PhysicsSystem;

impl PhysicsSystem {
    pub fn distance_squared(a: Vec2, b: Vec2) -> f32 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        dx * dx + dy * dy
    }

    /// Circle overlap, touching counts as a hit
    pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
        let combined = radius_a + radius_b;
        Self::distance_squared(a, b) <= combined * combined
    }

    /// Band overlap used by the catch variant.
    /// `bottom` is the item's leading (lower) edge, `center_x` its horizontal centre.
    pub fn band_overlap(bottom: f32, center_x: f32, band: &CatchBand) -> bool {
        (band.top..=band.bottom).contains(&bottom) && (band.left..=band.right).contains(&center_x)
    }

    pub fn clamp_to_bounds(p: Vec2, bounds: &WorldBounds) -> Vec2 {
        Vec2 {
            x: p.x.clamp(0.0, bounds.width),
            y: p.y.clamp(0.0, bounds.height),
        }
    }

    pub fn is_out_of_bounds(p: Vec2, bounds: &WorldBounds) -> bool {
        p.x < 0.0 || p.x > bounds.width || p.y < 0.0 || p.y > bounds.height
    }
}
