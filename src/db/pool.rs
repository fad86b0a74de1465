//! Catalog database connection
//!
//! PostgreSQL is optional: without `DATABASE_URL` the server runs on the
//! in-memory catalog and none of this is used.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::Config;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Connect and migrate the catalog database, if one is configured
pub async fn connect_catalog(config: &Config) -> anyhow::Result<Option<PgPool>> {
    let Some(url) = config.database_url.as_deref() else {
        return Ok(None);
    };

    info!(database = %redact_url(url), "Connecting to catalog database");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(url)
        .await?;

    info!(
        max_connections = config.db_max_connections,
        "Catalog pool ready"
    );

    run_migrations(&pool).await?;
    Ok(Some(pool))
}

/// Apply the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Catalog migrations applied");
    Ok(())
}

/// Round-trip time of a trivial query, `None` when the database is unreachable
pub async fn ping(pool: &PgPool) -> Option<Duration> {
    let started = Instant::now();
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => Some(started.elapsed()),
        Err(e) => {
            error!("Catalog database ping failed: {}", e);
            None
        }
    }
}

/// Connection URL safe for logs: the password is masked
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                // set_password only fails for URLs that cannot carry credentials
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable database url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url_masks_password() {
        assert_eq!(
            redact_url("postgres://livetv:hunter2@db:5432/livetv"),
            "postgres://livetv:***@db:5432/livetv"
        );
        assert_eq!(
            redact_url("postgres://db:5432/livetv"),
            "postgres://db:5432/livetv"
        );
        assert_eq!(redact_url("not a url"), "<unparseable database url>");
    }

    #[tokio::test]
    async fn test_no_database_url_means_no_pool() {
        let config = Config::from_lookup(|_| None);
        assert!(config.database_url.is_none());
        assert!(connect_catalog(&config).await.unwrap().is_none());
    }
}
