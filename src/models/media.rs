use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// On-demand media file known to the library
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub title: String,
    /// Path relative to the configured media root
    pub file_path: String,
    pub media_type: String,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}
