use axum::{
    Extension,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};
use sprite_gateway::connection;

use crate::AppState;
use crate::middleware::Claims;

/// Upgrade an authenticated adapter to the notification stream.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, claims.sub))
}
