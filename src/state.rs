use crate::ai::AiService;
use crate::registry::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry: the signaling core's source of truth for who is online.
    pub registry: ConnectionRegistry,
    /// AI chat proxy: upstream client, key pool, and in-memory caches.
    pub ai: AiService,
}
