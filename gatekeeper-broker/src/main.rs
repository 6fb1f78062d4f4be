//! Gatekeeper Broker
//!
//! Administrator approval service: sends approval emails and handles the
//! approve and reject links.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatekeeper_broker::{
    routes, spawn_transport_chain, AppState, Config, IdentityProvider, InMemoryIdentityProvider,
    InMemoryStore, RegistrationStore, SqliteStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper_broker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    match &config.database_path {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(path)?);
            tracing::info!(path = %path, "Using SQLite store");
            // The same database holds the identity accounts
            serve(&config, store.clone(), store).await
        }
        None => {
            tracing::warn!("DATABASE_PATH not set, using in-memory store");
            serve(
                &config,
                Arc::new(InMemoryStore::new()),
                Arc::new(InMemoryIdentityProvider::new()),
            )
            .await
        }
    }
}

async fn serve<S, I>(config: &Config, store: Arc<S>, identity: Arc<I>) -> Result<()>
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
{
    let transport = spawn_transport_chain(config.mail.clone(), store.clone())
        .await?;

    // Create app state
    let state = Arc::new(AppState::new(config, store, identity, transport));

    // Create router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Broker listening on http://{}", addr);
    tracing::info!("Approval links point at {}", config.public_base_url);

    axum::serve(listener, app).await?;

    Ok(())
}
