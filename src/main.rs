use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livetv_server::config::Config;
use livetv_server::db::{connect_catalog, MemoryCatalog, Stores};
use livetv_server::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livetv_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting LiveTV Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app_env);

    // Catalog backend: PostgreSQL when configured, in-memory otherwise
    let (stores, pool) = match connect_catalog(&config).await? {
        Some(pool) => (Stores::postgres(pool.clone()), Some(pool)),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory catalog");
            (Stores::memory(&MemoryCatalog::new()), None)
        }
    };

    if config.admin_key.is_none() {
        tracing::warn!("ADMIN_KEY not set, playlist management is disabled");
    }

    tokio::fs::create_dir_all(&config.playlists_dir).await?;
    tracing::info!("Playlists directory: {}", config.playlists_dir.display());

    // Build application state
    let state = Arc::new(AppState::new(config, stores, pool)?);
    let app = create_app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
