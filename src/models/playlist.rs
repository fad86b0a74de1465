use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::xtream::{XtreamCredentials, XTREAM_SCHEME};

/// Declared playlist type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    M3u,
    Xtream,
}

impl PlaylistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistType::M3u => "m3u",
            PlaylistType::Xtream => "xtream",
        }
    }
}

impl std::fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaylistType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m3u" => Ok(PlaylistType::M3u),
            "xtream" => Ok(PlaylistType::Xtream),
            _ => Err(AppError::Validation("Invalid playlist type".to_string())),
        }
    }
}

/// Where a playlist's channels come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOrigin {
    Upload,
    RemoteXtream,
}

impl SourceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOrigin::Upload => "upload",
            SourceOrigin::RemoteXtream => "remote-xtream",
        }
    }
}

/// Decoded form of the stored `file_path` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// Uploaded payload persisted on disk
    Upload(PathBuf),
    /// Remote Xtream provider, `xtream://{url}/{username}/{password}`
    Xtream(XtreamCredentials),
}

impl ConnectionDescriptor {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if raw.starts_with(XTREAM_SCHEME) {
            Ok(ConnectionDescriptor::Xtream(raw.parse()?))
        } else {
            Ok(ConnectionDescriptor::Upload(PathBuf::from(raw)))
        }
    }

    pub fn origin(&self) -> SourceOrigin {
        match self {
            ConnectionDescriptor::Upload(_) => SourceOrigin::Upload,
            ConnectionDescriptor::Xtream(_) => SourceOrigin::RemoteXtream,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ConnectionDescriptor::Upload(path) => path.to_string_lossy().into_owned(),
            ConnectionDescriptor::Xtream(creds) => creds.to_connection_string(),
        }
    }
}

/// A registered playlist source
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSource {
    pub id: Uuid,
    pub name: String,
    pub playlist_type: PlaylistType,
    /// Connection descriptor (upload path or encoded Xtream credentials)
    pub file_path: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlaylistSource {
    pub fn connection(&self) -> Result<ConnectionDescriptor, AppError> {
        ConnectionDescriptor::parse(&self.file_path)
    }
}

/// New playlist to insert
#[derive(Debug, Clone)]
pub struct NewPlaylist {
    pub name: String,
    pub playlist_type: PlaylistType,
    pub connection: ConnectionDescriptor,
}

/// Playlist listing entry
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistSummary {
    pub id: Uuid,
    pub name: String,
    pub playlist_type: PlaylistType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub channel_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_type_parse() {
        assert_eq!("m3u".parse::<PlaylistType>().unwrap(), PlaylistType::M3u);
        assert_eq!("xtream".parse::<PlaylistType>().unwrap(), PlaylistType::Xtream);
        assert!(matches!(
            "m3u8".parse::<PlaylistType>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_descriptor_dispatch() {
        let upload = ConnectionDescriptor::parse("/media/playlists/news_20240101_120000.m3u").unwrap();
        assert_eq!(upload.origin(), SourceOrigin::Upload);

        let remote = ConnectionDescriptor::parse("xtream://http://host:8080/user/pass").unwrap();
        assert_eq!(remote.origin(), SourceOrigin::RemoteXtream);
        assert_eq!(remote.encode(), "xtream://http://host:8080/user/pass");
    }
}
