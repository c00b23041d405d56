use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};

use crate::ai::proxy as ai_proxy;
use crate::config::Config;
use crate::monitor;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let ai_config = config.ai.clone().unwrap_or_default();

    // Rate limiting on the AI proxy only; signaling and monitoring stay
    // unthrottled. Uses PeerIpKeyExtractor which reads ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(ai_config.rate_limit_replenish_secs)
            .burst_size(ai_config.rate_limit_burst)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let ai_routes = Router::new()
        .route(
            "/v1/chat/completions",
            axum::routing::post(ai_proxy::chat_completions),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    let monitor_routes = Router::new().route(
        "/api/monitor/status",
        axum::routing::get(monitor::get_server_status),
    );

    // WebSocket endpoint (no auth; identifiers are claimed via REGISTER)
    let ws_routes = Router::new().route(
        "/signaling",
        axum::routing::get(ws_handler::ws_upgrade),
    );

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(ai_routes)
        .merge(monitor_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}

/// An empty allow-list keeps the permissive default; otherwise only the
/// configured origins pass. Unparseable entries are skipped with a warning.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable allowed origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
