//! Server status endpoint for external monitoring.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Response body for GET /api/monitor/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub online_users: usize,
    pub online_user_ids: Vec<String>,
    /// Server wall clock in epoch milliseconds.
    pub server_time: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ServerStatus {
    fn running(online_users: usize, online_user_ids: Vec<String>) -> Self {
        Self {
            online_users,
            online_user_ids,
            server_time: chrono::Utc::now().timestamp_millis(),
            status: "running".to_string(),
            error_message: None,
        }
    }
}

/// GET /api/monitor/status — online user count and server time.
/// Reads the registry; never touches the signaling path.
pub async fn get_server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    tracing::debug!("server status requested");
    let status = ServerStatus::running(state.registry.count(), state.registry.user_ids());
    Json(status)
}
