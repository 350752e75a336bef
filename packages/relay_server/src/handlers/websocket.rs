use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::ws;

/// Chat WebSocket handler - one session per connection
pub async fn chat_websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let session_config = state.session_config.clone();
    let metrics = state.metrics.clone();

    ws.max_message_size(state.server_config.max_frame_bytes)
        .on_upgrade(move |socket| ws::handle_chat_ws(socket, hub, session_config, metrics))
}
