//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::{ArenaConfig, CatchConfig};
use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::DEFAULT_TICK_MS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated. `*` allows any.
    pub client_origin: String,
    /// Inbound WebSocket messages allowed per connection per second
    pub input_rate_limit: u32,

    pub arena: ArenaConfig,
    pub catch: CatchConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins (hosting platforms set it), then SERVER_ADDR, then default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string())
        };

        let arena = ArenaConfig {
            tick_interval: Duration::from_millis(
                parse_or("ARENA_TICK_MS", DEFAULT_TICK_MS)?.max(1),
            ),
            round_duration_ms: parse_or("ARENA_ROUND_SECS", 180u64)? as f32 * 1000.0,
            powerup_spawn_rate: parse_or("POWERUP_SPAWN_RATE", 0.001f64)?,
            ..ArenaConfig::default()
        };

        let catch = CatchConfig {
            tick_interval: Duration::from_millis(
                parse_or("CATCH_TICK_MS", DEFAULT_TICK_MS)?.max(1),
            ),
            round_duration_ms: parse_or("CATCH_ROUND_SECS", 30u64)? as f32 * 1000.0,
            ..CatchConfig::default()
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            input_rate_limit: parse_or("INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
            arena,
            catch,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            log_level: "info".to_string(),
            client_origin: "*".to_string(),
            input_rate_limit: INPUT_RATE_LIMIT,
            arena: ArenaConfig::default(),
            catch: CatchConfig::default(),
        }
    }
}

/// Optional variable with a fallback; present but unparsable is an error
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
