use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use peerlink_server::ai::{mood, AiService};
use peerlink_server::config::{generate_config_template, Config};
use peerlink_server::registry::ConnectionRegistry;
use peerlink_server::routes;
use peerlink_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "peerlink_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "peerlink_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Peerlink server v{} starting", env!("CARGO_PKG_VERSION"));

    let ai_config = config.ai.clone().unwrap_or_default();
    let ai = AiService::new(ai_config.clone());

    // Daily mood cache reset
    mood::spawn_daily_clear(
        ai.moods().clone(),
        Duration::from_secs(ai_config.mood_clear_interval_secs),
    );

    let app_state = AppState {
        registry: ConnectionRegistry::new(),
        ai,
    };

    // Build router
    let app = routes::build_router(app_state, &config);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
