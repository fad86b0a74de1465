//! Playlist repository for database operations

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{PlaylistRow, PlaylistSummaryRow};
use crate::models::NewPlaylist;

/// Insert a new playlist and return the stored row
pub async fn create_playlist(
    pool: &PgPool,
    playlist: &NewPlaylist,
) -> Result<PlaylistRow, sqlx::Error> {
    let now = Utc::now();

    sqlx::query_as::<_, PlaylistRow>(
        r#"
        INSERT INTO playlists (id, name, playlist_type, file_path, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, $5, $5)
        RETURNING id, name, playlist_type, file_path, is_active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&playlist.name)
    .bind(playlist.playlist_type.as_str())
    .bind(playlist.connection.encode())
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Find playlist by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PlaylistRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaylistRow>(
        r#"
        SELECT id, name, playlist_type, file_path, is_active, created_at, updated_at
        FROM playlists
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// List all playlists with their channel counts
pub async fn list_with_counts(pool: &PgPool) -> Result<Vec<PlaylistSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaylistSummaryRow>(
        r#"
        SELECT p.id, p.name, p.playlist_type, p.is_active, p.created_at, p.updated_at,
               COUNT(c.id) AS channel_count
        FROM playlists p
        LEFT JOIN live_tv_channels c ON c.playlist_id = p.id
        GROUP BY p.id
        ORDER BY p.created_at
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Update mutable fields and bump updated_at
pub async fn update_playlist(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    file_path: &str,
    is_active: bool,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE playlists SET
            name = $2,
            file_path = $3,
            is_active = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(file_path)
    .bind(is_active)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Delete playlist (channels CASCADE, but callers remove them first)
pub async fn delete_playlist(pool: &PgPool, playlist_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM playlists WHERE id = $1")
        .bind(playlist_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
