//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::ConnectionState;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    tracing::trace!(state = %ConnectionState::Connecting, "websocket upgrade requested");
    ws.on_failed_upgrade(|err: axum::Error| {
        tracing::warn!(error = %err, "websocket upgrade failed");
    })
    .on_upgrade(move |socket| run_connection(socket, state))
}
