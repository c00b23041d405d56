use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// Signaling frames are small (SDP plus a handful of ICE candidates); cap
/// inbound frames well above that but low enough that a hostile client cannot
/// balloon memory.
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// GET /signaling
/// WebSocket upgrade endpoint. Identifiers are self-chosen at REGISTER time,
/// so there is no authentication here; every accepted socket starts
/// unregistered and gets its own actor.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| actor::run_connection(socket, state))
}
