//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::{arena_ws_handler, catch_ws_handler};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(arena_ws_handler))
        .route("/catch/ws", get(catch_ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` (or nothing parsable) allows any origin; otherwise a comma-separated list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if client_origin.trim() == "*" || allowed_origins.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(allowed_origins)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    rooms: usize,
    arena_rooms: usize,
    catch_rooms: usize,
    /// Unix millis
    timestamp: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        rooms: state.room_count(),
        arena_rooms: state.arena.room_count(),
        catch_rooms: state.catch.room_count(),
        timestamp: unix_millis(),
    })
}
