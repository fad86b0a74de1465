//! Playlist ingestion
//!
//! Registers playlist sources and keeps their channel catalogs in sync:
//! upload, remote Xtream registration, refresh and delete. Every operation on
//! one source runs under that source's lock; different sources proceed in
//! parallel.
//!
//! When the source cannot be read (unreadable file, panel down, bad JSON) the
//! existing catalog is left as it was and the outcome carries
//! `upstream_error`. Store failures propagate.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::store::Stores;
use crate::error::AppError;
use crate::models::{
    ChannelDescriptor, ConnectionDescriptor, NewPlaylist, PlaylistSource, PlaylistType,
};
use crate::services::m3u_parser;
use crate::services::metrics::record_ingest;
use crate::services::reconciler::reconcile;
use crate::services::xtream::{XtreamClient, XtreamCredentials};

const MAX_FILE_STEM_LEN: usize = 64;

/// Per-source async locks
///
/// Entries nobody holds are pruned on the next acquisition.
#[derive(Default)]
pub struct SourceLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl SourceLocks {
    pub async fn acquire(&self, source_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|id, lock| *id == source_id || Arc::strong_count(lock) > 1);
            locks.entry(source_id).or_default().clone()
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().map(|l| l.len()).unwrap_or(0)
    }
}

/// Report of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub playlist: PlaylistSource,
    /// Channels stored by this run
    pub channel_count: usize,
    /// Malformed lines or entries that produced no channel
    pub skipped: usize,
    /// Set when the source could not be read; the catalog is unchanged
    pub upstream_error: Option<String>,
}

impl IngestOutcome {
    pub fn is_degraded(&self) -> bool {
        self.upstream_error.is_some()
    }
}

/// Descriptors read from a source
struct Fetched {
    channels: Vec<ChannelDescriptor>,
    skipped: usize,
}

pub struct IngestService {
    stores: Stores,
    xtream: XtreamClient,
    playlists_dir: PathBuf,
    locks: SourceLocks,
}

impl IngestService {
    pub fn new(stores: Stores, xtream: XtreamClient, playlists_dir: PathBuf) -> Self {
        Self {
            stores,
            xtream,
            playlists_dir,
            locks: SourceLocks::default(),
        }
    }

    /// Persist an uploaded playlist, register it and import its channels
    ///
    /// The payload is always parsed as M3U, whatever `playlist_type` says.
    pub async fn ingest_upload(
        &self,
        name: &str,
        playlist_type: &str,
        payload: &[u8],
    ) -> Result<IngestOutcome, AppError> {
        let playlist_type: PlaylistType = playlist_type.parse()?;
        let name = validate_name(name)?;

        tokio::fs::create_dir_all(&self.playlists_dir).await?;
        let file_path = self.playlists_dir.join(upload_file_name(&name));
        tokio::fs::write(&file_path, payload).await?;
        debug!(path = %file_path.display(), bytes = payload.len(), "Stored uploaded playlist");

        let created = self
            .stores
            .playlists
            .create(NewPlaylist {
                name,
                playlist_type,
                connection: ConnectionDescriptor::Upload(file_path.clone()),
            })
            .await;

        let playlist = match created {
            Ok(playlist) => playlist,
            Err(e) => {
                remove_file_if_present(&file_path).await;
                return Err(e.into());
            }
        };

        info!(playlist_id = %playlist.id, name = %playlist.name, "Playlist uploaded");

        let _guard = self.locks.acquire(playlist.id).await;
        self.sync_source(playlist).await
    }

    /// Register a remote Xtream source and import its live channels
    pub async fn ingest_remote(
        &self,
        name: &str,
        credentials: XtreamCredentials,
    ) -> Result<IngestOutcome, AppError> {
        let name = validate_name(name)?;

        let playlist = self
            .stores
            .playlists
            .create(NewPlaylist {
                name,
                playlist_type: PlaylistType::Xtream,
                connection: ConnectionDescriptor::Xtream(credentials),
            })
            .await?;

        info!(playlist_id = %playlist.id, name = %playlist.name, "Xtream playlist registered");

        let _guard = self.locks.acquire(playlist.id).await;
        self.sync_source(playlist).await
    }

    /// Re-read a registered source and replace its channels
    ///
    /// Dispatches on the stored connection descriptor.
    pub async fn refresh(&self, playlist_id: Uuid) -> Result<IngestOutcome, AppError> {
        let _guard = self.locks.acquire(playlist_id).await;

        let playlist = self
            .stores
            .playlists
            .find_by_id(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("Playlist"))?;

        self.sync_source(playlist).await
    }

    /// Remove a source, its channels and its stored payload
    pub async fn delete(&self, playlist_id: Uuid) -> Result<(), AppError> {
        let _guard = self.locks.acquire(playlist_id).await;

        let playlist = self
            .stores
            .playlists
            .find_by_id(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("Playlist"))?;

        let removed = self.stores.channels.delete_by_playlist(playlist_id).await?;

        if let Ok(ConnectionDescriptor::Upload(path)) = playlist.connection() {
            remove_file_if_present(&path).await;
        }

        if !self.stores.playlists.delete(playlist_id).await? {
            return Err(AppError::not_found("Playlist"));
        }

        info!(playlist_id = %playlist_id, channels = removed, "Playlist deleted");
        Ok(())
    }

    /// Fetch and reconcile; caller holds the source lock
    async fn sync_source(&self, mut playlist: PlaylistSource) -> Result<IngestOutcome, AppError> {
        let connection = playlist.connection()?;
        let origin = connection.origin().as_str();

        let fetched = match self.fetch(&connection).await {
            Ok(fetched) => fetched,
            Err(message) => {
                warn!(
                    playlist_id = %playlist.id,
                    origin,
                    error = %message,
                    "Source unavailable, keeping existing channels"
                );
                record_ingest(origin, "upstream_failure");
                return Ok(IngestOutcome {
                    playlist,
                    channel_count: 0,
                    skipped: 0,
                    upstream_error: Some(message),
                });
            }
        };

        let summary = match reconcile(
            self.stores.channels.as_ref(),
            playlist.id,
            fetched.channels,
        )
        .await
        {
            Ok(summary) => summary,
            Err(e) => {
                record_ingest(origin, "error");
                return Err(e.into());
            }
        };

        playlist.updated_at = Utc::now();
        self.stores.playlists.update(&playlist).await?;
        record_ingest(origin, "ok");

        info!(
            playlist_id = %playlist.id,
            origin,
            channels = summary.inserted,
            skipped = fetched.skipped,
            "Playlist synchronized"
        );

        Ok(IngestOutcome {
            playlist,
            channel_count: summary.inserted as usize,
            skipped: fetched.skipped,
            upstream_error: None,
        })
    }

    async fn fetch(&self, connection: &ConnectionDescriptor) -> Result<Fetched, String> {
        match connection {
            ConnectionDescriptor::Upload(path) => {
                let payload = tokio::fs::read(path)
                    .await
                    .map_err(|e| format!("Failed to read playlist file: {}", e))?;
                let parsed = m3u_parser::parse_bytes(&payload);

                Ok(Fetched {
                    channels: parsed.channels,
                    skipped: parsed.dropped,
                })
            }
            ConnectionDescriptor::Xtream(creds) => {
                let fetch = self
                    .xtream
                    .fetch_live_channels(creds)
                    .await
                    .map_err(|e| format!("Xtream fetch failed: {}", e))?;

                Ok(Fetched {
                    channels: fetch.channels,
                    skipped: fetch.skipped,
                })
            }
        }
    }
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Playlist name is required".into()));
    }
    Ok(name.to_string())
}

/// `{sanitized-name}_{YYYYmmdd_HHMMSS}_{short-id}.m3u`
fn upload_file_name(name: &str) -> String {
    let mut stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_STEM_LEN)
        .collect();

    if stem.trim_matches('_').is_empty() {
        stem = "playlist".to_string();
    }

    let short_id = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.m3u",
        stem,
        Utc::now().format("%Y%m%d_%H%M%S"),
        &short_id[..8]
    )
}

async fn remove_file_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed playlist file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove playlist file: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::store::{ChannelStore, PlaylistStore};
    use crate::db::MemoryCatalog;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TWO_CHANNELS: &str =
        "#EXTINF:-1,Channel One\nhttp://x/1.m3u8\n#EXTINF:-1,Channel Two\nhttp://x/2.m3u8";

    fn service(catalog: &MemoryCatalog, dir: &Path) -> Arc<IngestService> {
        let xtream = XtreamClient::from_config(&Config::from_lookup(|_| None)).unwrap();
        Arc::new(IngestService::new(
            Stores::memory(catalog),
            xtream,
            dir.to_path_buf(),
        ))
    }

    #[test]
    fn test_upload_file_name() {
        let name = upload_file_name("My List/../évil");
        assert!(name.starts_with("My_List____"));
        assert!(name.ends_with(".m3u"));
        assert!(!name.contains('/'));

        assert!(upload_file_name("///").starts_with("playlist_"));
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_channels() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());

        let outcome = ingest
            .ingest_upload("News", "xtream", TWO_CHANNELS.as_bytes())
            .await
            .unwrap();

        assert_eq!(outcome.channel_count, 2);
        assert_eq!(outcome.playlist.playlist_type, PlaylistType::Xtream);
        assert!(outcome.upstream_error.is_none());
        assert!(Path::new(&outcome.playlist.file_path).exists());

        let stored = catalog
            .channels()
            .find_by_playlist(outcome.playlist.id)
            .await
            .unwrap();
        assert_eq!(stored[0].name, "Channel One");
        assert_eq!(stored[1].url, "http://x/2.m3u8");
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());

        let err = ingest
            .ingest_upload("News", "m3u8", TWO_CHANNELS.as_bytes())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_unknown_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let ingest = service(&MemoryCatalog::new(), dir.path());

        let err = ingest.refresh(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = ingest.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());

        let outcome = ingest
            .ingest_upload("News", "m3u", TWO_CHANNELS.as_bytes())
            .await
            .unwrap();
        std::fs::write(
            &outcome.playlist.file_path,
            "#EXTINF:-1,Only\nhttp://x/only\n#EXTINF:-1,Dangling\n",
        )
        .unwrap();

        let refreshed = ingest.refresh(outcome.playlist.id).await.unwrap();
        assert_eq!(refreshed.channel_count, 1);
        assert_eq!(refreshed.skipped, 1);
        assert!(refreshed.playlist.updated_at >= outcome.playlist.updated_at);
    }

    #[tokio::test]
    async fn test_missing_file_keeps_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());

        let outcome = ingest
            .ingest_upload("News", "m3u", TWO_CHANNELS.as_bytes())
            .await
            .unwrap();
        std::fs::remove_file(&outcome.playlist.file_path).unwrap();

        let refreshed = ingest.refresh(outcome.playlist.id).await.unwrap();
        assert!(refreshed.is_degraded());
        assert_eq!(
            catalog
                .channels()
                .find_by_playlist(outcome.playlist.id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_removes_channels_file_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());

        let outcome = ingest
            .ingest_upload("News", "m3u", TWO_CHANNELS.as_bytes())
            .await
            .unwrap();
        let id = outcome.playlist.id;

        ingest.delete(id).await.unwrap();

        assert!(!Path::new(&outcome.playlist.file_path).exists());
        assert!(catalog.playlists().find_by_id(id).await.unwrap().is_none());
        assert!(catalog.channels().find_by_playlist(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_xtream_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live/user/pass"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());
        let creds = XtreamCredentials::new(server.uri(), "user", "pass").unwrap();

        let outcome = ingest.ingest_remote("Panel", creds.clone()).await.unwrap();

        assert_eq!(outcome.channel_count, 0);
        assert!(outcome.upstream_error.as_deref().unwrap().contains("500"));
        assert_eq!(outcome.playlist.file_path, creds.to_connection_string());
        // The source stays registered so it can be refreshed later
        assert!(catalog
            .playlists()
            .find_by_id(outcome.playlist.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_xtream_refresh_dispatches_on_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live/user/pass"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Panel One", "url": "http://p/1.ts", "category_name": "News"}
            ])))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());
        let creds = XtreamCredentials::new(server.uri(), "user", "pass").unwrap();

        let outcome = ingest.ingest_remote("Panel", creds).await.unwrap();
        assert_eq!(outcome.channel_count, 1);

        let refreshed = ingest.refresh(outcome.playlist.id).await.unwrap();
        assert_eq!(refreshed.channel_count, 1);
        let stored = catalog
            .channels()
            .find_by_playlist(outcome.playlist.id)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].category, "News");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_refresh_never_empties_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MemoryCatalog::new();
        let ingest = service(&catalog, dir.path());

        let outcome = ingest
            .ingest_upload("News", "m3u", TWO_CHANNELS.as_bytes())
            .await
            .unwrap();
        let id = outcome.playlist.id;

        let reader_catalog = catalog.clone();
        let reader = tokio::spawn(async move {
            let store = reader_catalog.channels();
            for _ in 0..500 {
                let count = store.find_by_playlist(id).await.unwrap().len();
                assert_eq!(count, 2);
                tokio::task::yield_now().await;
            }
        });

        let refreshes: Vec<_> = (0..8)
            .map(|_| {
                let ingest = ingest.clone();
                tokio::spawn(async move { ingest.refresh(id).await })
            })
            .collect();

        for handle in refreshes {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.channel_count, 2);
        }
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_source_lock_serializes_same_source() {
        let locks = Arc::new(SourceLocks::default());
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        // Another source is not blocked
        drop(locks.acquire(Uuid::new_v4()).await);

        drop(guard);
        contender.await.unwrap();

        drop(locks.acquire(Uuid::new_v4()).await);
        assert_eq!(locks.tracked(), 1);
    }
}
