//! Database row types for PostgreSQL
//!
//! These types map directly to database rows and convert into the
//! domain types in `models/`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    ChannelRecord, MediaRecord, NewChannel, PlaylistSource, PlaylistSummary, PlaylistType,
};

// ============================================================================
// Database Row Types
// ============================================================================

/// Playlist row from database
#[derive(Debug, Clone, FromRow)]
pub struct PlaylistRow {
    pub id: Uuid,
    pub name: String,
    pub playlist_type: String,
    pub file_path: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PlaylistRow> for PlaylistSource {
    type Error = StoreError;

    fn try_from(row: PlaylistRow) -> Result<Self, Self::Error> {
        Ok(PlaylistSource {
            id: row.id,
            name: row.name,
            playlist_type: parse_playlist_type(&row.playlist_type)?,
            file_path: row.file_path,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Playlist row joined with its channel count
#[derive(Debug, Clone, FromRow)]
pub struct PlaylistSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub playlist_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub channel_count: i64,
}

impl TryFrom<PlaylistSummaryRow> for PlaylistSummary {
    type Error = StoreError;

    fn try_from(row: PlaylistSummaryRow) -> Result<Self, Self::Error> {
        Ok(PlaylistSummary {
            id: row.id,
            name: row.name,
            playlist_type: parse_playlist_type(&row.playlist_type)?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            channel_count: row.channel_count,
        })
    }
}

/// Channel row from database
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: Uuid,
    pub playlist_id: Uuid,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub category: String,
    pub language: String,
    pub country: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ChannelRow> for ChannelRecord {
    fn from(row: ChannelRow) -> Self {
        ChannelRecord {
            id: row.id,
            playlist_id: row.playlist_id,
            name: row.name,
            url: row.url,
            logo_url: row.logo_url,
            category: row.category,
            language: row.language,
            country: row.country,
            is_active: row.is_active,
            sort_order: row.sort_order,
            created_at: row.created_at,
        }
    }
}

/// Media row from database
#[derive(Debug, Clone, FromRow)]
pub struct MediaRow {
    pub id: Uuid,
    pub title: String,
    pub file_path: String,
    pub media_type: String,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<MediaRow> for MediaRecord {
    fn from(row: MediaRow) -> Self {
        MediaRecord {
            id: row.id,
            title: row.title,
            file_path: row.file_path,
            media_type: row.media_type,
            file_size: row.file_size,
            created_at: row.created_at,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_playlist_type(s: &str) -> Result<PlaylistType, StoreError> {
    s.parse().map_err(|_| StoreError::InvalidRow {
        table: "playlists",
        message: format!("unknown playlist_type '{}'", s),
    })
}

/// Escape a value for the COPY text format
fn copy_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Format channel for COPY protocol (tab-separated values)
pub fn format_copy_line(channel: &NewChannel, playlist_id: Uuid) -> String {
    // id, playlist_id, name, url, logo_url, category, language, country, is_active, sort_order
    let d = &channel.descriptor;

    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tt\t{}\n",
        channel.id,
        playlist_id,
        copy_escape(&d.name),
        copy_escape(&d.url),
        d.logo_url
            .as_deref()
            .map(copy_escape)
            .unwrap_or_else(|| "\\N".to_string()),
        copy_escape(&d.category),
        copy_escape(&d.language),
        copy_escape(&d.country),
        channel.sort_order,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelDescriptor;

    #[test]
    fn test_copy_line_escapes_control_characters() {
        let mut descriptor = ChannelDescriptor::new("News\tHD", "http://x/1.ts?a=b\\c");
        descriptor.logo_url = None;
        let channel = NewChannel {
            id: Uuid::nil(),
            descriptor,
            sort_order: 3,
        };

        let line = format_copy_line(&channel, Uuid::nil());
        let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();

        assert_eq!(fields.len(), 10);
        assert_eq!(fields[2], "News\\tHD");
        assert_eq!(fields[3], "http://x/1.ts?a=b\\\\c");
        assert_eq!(fields[4], "\\N");
        assert_eq!(fields[5], "General");
        assert_eq!(fields[8], "t");
        assert_eq!(fields[9], "3");
    }
}
