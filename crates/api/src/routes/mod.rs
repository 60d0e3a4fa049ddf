pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// ```text
/// /status            current states + recent transitions
/// /history           transitions (?limit=1..200)
/// /timeline          check records (?days=N)
/// /ws                WebSocket push channel
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::status::get_status))
        .route("/history", get(handlers::status::get_history))
        .route("/timeline", get(handlers::timeline::get_timeline))
        .route("/ws", get(ws::ws_handler))
}
