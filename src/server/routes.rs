use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness probe
        .route("/", get(handlers::probe))
        // Engine state snapshot
        .route("/status", get(handlers::engine_status))
        // Engine control
        .route("/start", get(handlers::start_engine))
        .route("/shutdown", get(handlers::shutdown_engine))
        // Streaming channels
        .route("/ws", get(handlers::transcript_ws))
        .route("/status-ws", get(handlers::status_ws))
        // Request logging + browser-client CORS
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
