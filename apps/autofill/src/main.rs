mod config;
mod dom;
mod errors;
mod field_handlers;
mod fill;
mod mapping;
mod models;
mod orchestrator;
mod page;
mod profile_client;
mod routes;
mod scanner;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::profile_client::ProfileClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{KeyValueStore, MemoryStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting autofill agent v{}", env!("CARGO_PKG_VERSION"));

    // Session storage: Redis when configured, otherwise process memory
    let store: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => {
            info!("Session store: Redis");
            Arc::new(RedisStore::new(url)?)
        }
        None => {
            info!("Session store: in-memory (sessions are lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let profiles = ProfileClient::new(&config.profile_api_url, config.network_timeout())?;
    info!("Profile service: {}", config.profile_api_url);

    let orchestrator = Orchestrator::new(Arc::new(profiles), store, config.timeouts());
    match orchestrator.restore().await {
        Ok(true) => info!("Restored persisted session"),
        Ok(false) => {}
        Err(e) => warn!("Could not restore persisted session: {e}"),
    }

    let state = AppState::new(config.clone(), orchestrator);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("127.0.0.1:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
