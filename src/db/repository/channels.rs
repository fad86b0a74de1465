//! Channel catalog repository with COPY-based replacement

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::{format_copy_line, ChannelRow};
use crate::models::{ChannelField, ChannelFilter, NewChannel};

const COPY_BATCH_SIZE: usize = 500;

const COPY_CHANNELS: &str = r#"
    COPY live_tv_channels (id, playlist_id, name, url, logo_url, category, language, country,
                           is_active, sort_order)
    FROM STDIN WITH (FORMAT text, NULL '\N')
"#;

/// Writes a playlist's channel set inside one transaction
///
/// The transaction holds a per-playlist advisory lock, so concurrent writers
/// for the same playlist queue up instead of interleaving.
pub struct ChannelCopyWriter {
    tx: Transaction<'static, Postgres>,
    playlist_id: Uuid,
    batch: Vec<NewChannel>,
    items_written: u64,
}

impl ChannelCopyWriter {
    /// Begin a transaction and take the playlist's advisory lock
    pub async fn begin(pool: &PgPool, playlist_id: Uuid) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(playlist_id.to_string())
            .execute(&mut *tx)
            .await?;

        Ok(Self {
            tx,
            playlist_id,
            batch: Vec::with_capacity(COPY_BATCH_SIZE),
            items_written: 0,
        })
    }

    /// Delete the playlist's current rows (visible only after commit)
    pub async fn clear_existing(&mut self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM live_tv_channels WHERE playlist_id = $1")
            .bind(self.playlist_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Write a single channel (batched)
    pub async fn write(&mut self, channel: NewChannel) -> Result<(), sqlx::Error> {
        self.batch.push(channel);

        if self.batch.len() >= COPY_BATCH_SIZE {
            self.flush_batch().await?;
        }

        Ok(())
    }

    async fn flush_batch(&mut self) -> Result<(), sqlx::Error> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let mut copy = self.tx.copy_in_raw(COPY_CHANNELS).await?;

        for channel in &self.batch {
            let line = format_copy_line(channel, self.playlist_id);
            copy.send(line.as_bytes()).await?;
        }

        copy.finish().await?;
        self.items_written += self.batch.len() as u64;
        self.batch.clear();

        Ok(())
    }

    /// Flush remaining rows and commit
    pub async fn commit(mut self) -> Result<u64, sqlx::Error> {
        self.flush_batch().await?;
        self.tx.commit().await?;

        Ok(self.items_written)
    }
}

/// Find channel by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, playlist_id, name, url, logo_url, category, language, country,
               is_active, sort_order, created_at
        FROM live_tv_channels
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// All channels of a playlist in import order
pub async fn find_by_playlist(
    pool: &PgPool,
    playlist_id: Uuid,
) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, playlist_id, name, url, logo_url, category, language, country,
               is_active, sort_order, created_at
        FROM live_tv_channels
        WHERE playlist_id = $1
        ORDER BY sort_order
        "#,
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await
}

/// Active channels with optional filters and pagination
pub async fn list_active(
    pool: &PgPool,
    filter: &ChannelFilter,
) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, playlist_id, name, url, logo_url, category, language, country,
               is_active, sort_order, created_at
        FROM live_tv_channels
        WHERE is_active
          AND ($1::text IS NULL OR category = $1)
          AND ($2::text IS NULL OR language = $2)
          AND ($3::text IS NULL OR country = $3)
        ORDER BY playlist_id, sort_order
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(filter.category.as_deref())
    .bind(filter.language.as_deref())
    .bind(filter.country.as_deref())
    .bind(filter.limit as i64)
    .bind(filter.skip as i64)
    .fetch_all(pool)
    .await
}

/// Distinct non-empty values of a filter column
pub async fn list_distinct(pool: &PgPool, field: ChannelField) -> Result<Vec<String>, sqlx::Error> {
    let column = field.column();
    let query = format!(
        "SELECT DISTINCT {col} FROM live_tv_channels WHERE {col} <> '' ORDER BY {col}",
        col = column
    );

    let rows: Vec<(String,)> = sqlx::query_as(&query).fetch_all(pool).await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Delete all channels for a playlist
pub async fn delete_by_playlist(pool: &PgPool, playlist_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM live_tv_channels WHERE playlist_id = $1")
        .bind(playlist_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Append channels to a playlist without touching existing rows
pub async fn insert_many(
    pool: &PgPool,
    playlist_id: Uuid,
    channels: Vec<NewChannel>,
) -> Result<u64, sqlx::Error> {
    let mut writer = ChannelCopyWriter::begin(pool, playlist_id).await?;
    for channel in channels {
        writer.write(channel).await?;
    }
    writer.commit().await
}

/// Replace a playlist's channels atomically; returns (removed, inserted)
pub async fn replace_for_playlist(
    pool: &PgPool,
    playlist_id: Uuid,
    channels: Vec<NewChannel>,
) -> Result<(u64, u64), sqlx::Error> {
    let mut writer = ChannelCopyWriter::begin(pool, playlist_id).await?;
    let removed = writer.clear_existing().await?;
    for channel in channels {
        writer.write(channel).await?;
    }
    let inserted = writer.commit().await?;

    Ok((removed, inserted))
}
