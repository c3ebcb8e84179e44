//! Werewolf Room Server
//!
//! Serves the room registry over HTTP, the narrator and speech endpoints,
//! and the optional WebSocket push channel.

use std::sync::Arc;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use werewolf::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "werewolf=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    info!("Werewolf Server v{}", VERSION);
    info!("HTTP address: {}", config.http_addr);
    match config.ws_addr {
        Some(addr) => info!("WebSocket address: {}", addr),
        None => info!("WebSocket push disabled"),
    }
    let providers: Vec<String> = config.narrator.endpoints().into_iter().map(|e| e.name).collect();
    info!("Narrator providers: {:?} (mock fallback always on)", providers);
    info!(
        "Room idle timeout: {}s, sweep every {}s",
        config.registry.idle_timeout.as_secs(),
        config.registry.sweep_interval.as_secs()
    );

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await.context("server stopped with an error")?;
    info!("Server stopped");
    Ok(())
}
