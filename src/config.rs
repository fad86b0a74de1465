use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub app_env: String,

    // PostgreSQL (None = in-memory catalog)
    pub database_url: Option<String>,
    pub db_max_connections: u32,

    // Storage
    pub media_path: PathBuf,
    pub playlists_dir: PathBuf,
    pub max_upload_mb: usize,

    // Identity
    pub admin_key: Option<String>,

    // Upstream
    pub upstream_connect_timeout_ms: u64,
    pub xtream_timeout_ms: u64,
    pub relay_buffer_chunks: usize,

    // Misc
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let media_path = PathBuf::from(var("MEDIA_PATH", "/media"));
        let playlists_dir = non_empty("PLAYLISTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| media_path.join("playlists"));

        Self {
            // Server
            port: var("PORT", "8000").parse().unwrap_or(8000),
            app_env: var("APP_ENV", "development"),

            // PostgreSQL
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: var("DB_MAX_CONNECTIONS", "15").parse().unwrap_or(15),

            // Storage
            media_path,
            playlists_dir,
            max_upload_mb: var("MAX_UPLOAD_MB", "100").parse().unwrap_or(100),

            // Identity
            admin_key: non_empty("ADMIN_KEY"),

            // Upstream: bounded connect, unbounded read for live streams
            upstream_connect_timeout_ms: var("UPSTREAM_CONNECT_TIMEOUT_MS", "10000")
                .parse()
                .unwrap_or(10_000),
            xtream_timeout_ms: var("XTREAM_TIMEOUT_MS", "30000")
                .parse()
                .unwrap_or(30_000),
            relay_buffer_chunks: var("RELAY_BUFFER_CHUNKS", "16")
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(16),

            // Misc - Use VLC user agent to avoid IPTV server blocks
            user_agent: var("USER_AGENT", "VLC/3.0.20 LibVLC/3.0.20"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
