//! Media library lookups

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::MediaRow;

/// Find media by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<MediaRow>, sqlx::Error> {
    sqlx::query_as::<_, MediaRow>(
        r#"
        SELECT id, title, file_path, media_type, file_size, created_at
        FROM media
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
