//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Nominal frame length that velocity constants are expressed against.
/// Speeds are "pixels per reference frame", so motion stays the same
/// whatever the actual tick interval is.
pub const REFERENCE_FRAME_MS: f32 = 16.0;

/// Default tick interval (~60 Hz)
pub const DEFAULT_TICK_MS: u64 = 16;

/// Scale factor for a velocity given an elapsed time in milliseconds
pub fn frame_scale(dt_ms: f32) -> f32 {
    dt_ms / REFERENCE_FRAME_MS
}

/// Measures the time between consecutive ticks of a driver.
/// Uses tokio's clock so paused-time tests see simulated time.
#[derive(Debug, Clone)]
pub struct TickClock {
    last: tokio::time::Instant,
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            last: tokio::time::Instant::now(),
        }
    }

    /// Milliseconds since the previous call (or since creation)
    pub fn lap_ms(&mut self) -> f32 {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed.as_secs_f32() * 1000.0
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
