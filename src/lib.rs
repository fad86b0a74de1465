pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::Stores;
use crate::services::xtream::XtreamClient;
use crate::services::{AdminKeyIdentity, IdentityProvider, IngestService, StreamProxy};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub ingest: IngestService,
    pub proxy: StreamProxy,
    pub identity: Arc<dyn IdentityProvider>,
    /// Present when the catalog lives in PostgreSQL
    pub pool: Option<PgPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire services over the given stores
    pub fn new(config: Config, stores: Stores, pool: Option<PgPool>) -> anyhow::Result<Self> {
        let xtream = XtreamClient::from_config(&config)?;
        let ingest = IngestService::new(stores.clone(), xtream, config.playlists_dir.clone());
        let proxy = StreamProxy::new(
            stores.channels.clone(),
            stores.media.clone(),
            StreamProxy::build_http(&config)?,
            &config,
        );
        let identity = Arc::new(AdminKeyIdentity::new(config.admin_key.clone()));

        Ok(Self {
            config,
            stores,
            ingest,
            proxy,
            identity,
            pool,
            start_time: Instant::now(),
        })
    }
}

/// Build the HTTP router
pub fn create_app(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_mb * 1024 * 1024;

    Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Playlist endpoints
        .route("/api/playlists", get(routes::playlists::list_playlists))
        .route(
            "/api/playlists/upload",
            post(routes::playlists::upload_playlist)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/playlists/xtream",
            post(routes::playlists::add_xtream_playlist),
        )
        .route(
            "/api/playlists/:id",
            delete(routes::playlists::delete_playlist),
        )
        .route(
            "/api/playlists/:id/refresh",
            post(routes::playlists::refresh_playlist),
        )
        // Live TV endpoints
        .route("/api/live-tv/channels", get(routes::live_tv::list_channels))
        .route("/api/live-tv/channels/:id", get(routes::live_tv::get_channel))
        .route(
            "/api/live-tv/channels/:id/stream",
            get(routes::live_tv::stream_channel),
        )
        .route("/api/live-tv/categories", get(routes::live_tv::get_categories))
        .route("/api/live-tv/languages", get(routes::live_tv::get_languages))
        .route("/api/live-tv/countries", get(routes::live_tv::get_countries))
        // Media endpoints
        .route("/api/media/:id/stream", get(routes::media::stream_media))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
