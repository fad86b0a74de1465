//! In-process catalog used when no database is configured and in tests
//!
//! All state sits behind one async `RwLock`; every mutation happens under a
//! single write guard, so a replacement is observed all-or-nothing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::store::{ChannelStore, MediaStore, PlaylistStore, ReplaceSummary};
use crate::error::StoreError;
use crate::models::{
    ChannelField, ChannelFilter, ChannelRecord, MediaRecord, NewChannel, NewPlaylist,
    PlaylistSource, PlaylistSummary,
};
use crate::services::reconciler::StagedChannels;

#[derive(Default)]
struct CatalogState {
    playlists: Vec<PlaylistSource>,
    channels: Vec<ChannelRecord>,
    media: Vec<MediaRecord>,
}

/// Shared in-memory catalog
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playlists(&self) -> MemoryPlaylistStore {
        MemoryPlaylistStore(self.clone())
    }

    pub fn channels(&self) -> MemoryChannelStore {
        MemoryChannelStore(self.clone())
    }

    pub fn media(&self) -> MemoryMediaStore {
        MemoryMediaStore(self.clone())
    }

    /// Register a media file (the library scanner lives elsewhere)
    pub async fn insert_media(&self, record: MediaRecord) {
        self.state.write().await.media.push(record);
    }

    /// Flip a channel's active flag; returns false if unknown
    pub async fn set_channel_active(&self, id: Uuid, active: bool) -> bool {
        let mut state = self.state.write().await;
        match state.channels.iter_mut().find(|c| c.id == id) {
            Some(channel) => {
                channel.is_active = active;
                true
            }
            None => false,
        }
    }
}

pub struct MemoryPlaylistStore(MemoryCatalog);

#[async_trait]
impl PlaylistStore for MemoryPlaylistStore {
    async fn create(&self, playlist: NewPlaylist) -> Result<PlaylistSource, StoreError> {
        let now = Utc::now();
        let record = PlaylistSource {
            id: Uuid::new_v4(),
            name: playlist.name,
            playlist_type: playlist.playlist_type,
            file_path: playlist.connection.encode(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.0.state.write().await.playlists.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PlaylistSource>, StoreError> {
        let state = self.0.state.read().await;
        Ok(state.playlists.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<PlaylistSummary>, StoreError> {
        let state = self.0.state.read().await;
        let summaries = state
            .playlists
            .iter()
            .map(|p| PlaylistSummary {
                id: p.id,
                name: p.name.clone(),
                playlist_type: p.playlist_type,
                is_active: p.is_active,
                created_at: p.created_at,
                updated_at: p.updated_at,
                channel_count: state
                    .channels
                    .iter()
                    .filter(|c| c.playlist_id == p.id)
                    .count() as i64,
            })
            .collect();

        Ok(summaries)
    }

    async fn update(&self, playlist: &PlaylistSource) -> Result<bool, StoreError> {
        let mut state = self.0.state.write().await;
        match state.playlists.iter_mut().find(|p| p.id == playlist.id) {
            Some(existing) => {
                existing.name = playlist.name.clone();
                existing.file_path = playlist.file_path.clone();
                existing.is_active = playlist.is_active;
                existing.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.0.state.write().await;
        let before = state.playlists.len();
        state.playlists.retain(|p| p.id != id);
        // Mirrors the ON DELETE CASCADE of the SQL schema
        state.channels.retain(|c| c.playlist_id != id);
        Ok(state.playlists.len() != before)
    }
}

pub struct MemoryChannelStore(MemoryCatalog);

#[async_trait]
impl ChannelStore for MemoryChannelStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChannelRecord>, StoreError> {
        let state = self.0.state.read().await;
        Ok(state.channels.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_playlist(&self, playlist_id: Uuid) -> Result<Vec<ChannelRecord>, StoreError> {
        let state = self.0.state.read().await;
        let mut channels: Vec<ChannelRecord> = state
            .channels
            .iter()
            .filter(|c| c.playlist_id == playlist_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.sort_order);
        Ok(channels)
    }

    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<ChannelRecord>, StoreError> {
        let state = self.0.state.read().await;
        let mut matching: Vec<&ChannelRecord> =
            state.channels.iter().filter(|c| filter.matches(c)).collect();
        // same order as the PostgreSQL listing, so pages line up
        matching.sort_by_key(|c| (c.playlist_id, c.sort_order));

        Ok(matching
            .into_iter()
            .skip(filter.skip)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn list_distinct(&self, field: ChannelField) -> Result<Vec<String>, StoreError> {
        let state = self.0.state.read().await;
        let mut values: Vec<String> = state
            .channels
            .iter()
            .map(|c| field.value(c))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }

    async fn delete_by_playlist(&self, playlist_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.0.state.write().await;
        let before = state.channels.len();
        state.channels.retain(|c| c.playlist_id != playlist_id);
        Ok((before - state.channels.len()) as u64)
    }

    async fn insert_many(
        &self,
        playlist_id: Uuid,
        channels: Vec<NewChannel>,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let records: Vec<ChannelRecord> = channels
            .into_iter()
            .map(|c| c.into_record(playlist_id, now))
            .collect();
        let inserted = records.len() as u64;

        self.0.state.write().await.channels.extend(records);
        Ok(inserted)
    }

    async fn replace_for_playlist(
        &self,
        staged: StagedChannels,
    ) -> Result<ReplaceSummary, StoreError> {
        let now = Utc::now();
        let playlist_id = staged.playlist_id;
        let records: Vec<ChannelRecord> = staged
            .rows
            .into_iter()
            .map(|c| c.into_record(playlist_id, now))
            .collect();
        let inserted = records.len() as u64;

        let mut state = self.0.state.write().await;
        let before = state.channels.len();
        state.channels.retain(|c| c.playlist_id != playlist_id);
        let removed = (before - state.channels.len()) as u64;
        state.channels.extend(records);

        Ok(ReplaceSummary { removed, inserted })
    }
}

pub struct MemoryMediaStore(MemoryCatalog);

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError> {
        let state = self.0.state.read().await;
        Ok(state.media.iter().find(|m| m.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelDescriptor, ConnectionDescriptor, PlaylistType};
    use crate::services::reconciler::stage;
    use std::path::PathBuf;

    async fn playlist(catalog: &MemoryCatalog, name: &str) -> PlaylistSource {
        catalog
            .playlists()
            .create(NewPlaylist {
                name: name.to_string(),
                playlist_type: PlaylistType::M3u,
                connection: ConnectionDescriptor::Upload(PathBuf::from("/tmp/x.m3u")),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_replace_only_touches_owner() {
        let catalog = MemoryCatalog::new();
        let channels = catalog.channels();
        let a = playlist(&catalog, "a").await;
        let b = playlist(&catalog, "b").await;

        channels
            .replace_for_playlist(stage(a.id, vec![ChannelDescriptor::new("A1", "http://a/1")]))
            .await
            .unwrap();
        channels
            .replace_for_playlist(stage(b.id, vec![ChannelDescriptor::new("B1", "http://b/1")]))
            .await
            .unwrap();

        let summary = channels
            .replace_for_playlist(stage(
                a.id,
                vec![
                    ChannelDescriptor::new("A2", "http://a/2"),
                    ChannelDescriptor::new("A3", "http://a/3"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(summary, ReplaceSummary { removed: 1, inserted: 2 });
        assert_eq!(channels.find_by_playlist(b.id).await.unwrap().len(), 1);
        let names: Vec<String> = channels
            .find_by_playlist(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["A2", "A3"]);
    }

    #[tokio::test]
    async fn test_delete_playlist_cascades() {
        let catalog = MemoryCatalog::new();
        let a = playlist(&catalog, "a").await;
        catalog
            .channels()
            .insert_many(a.id, stage(a.id, vec![ChannelDescriptor::new("A1", "http://a/1")]).rows)
            .await
            .unwrap();

        assert!(catalog.playlists().delete(a.id).await.unwrap());
        assert!(!catalog.playlists().delete(a.id).await.unwrap());
        assert!(catalog.channels().find_by_playlist(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_pages_by_playlist_then_import_order() {
        let catalog = MemoryCatalog::new();
        let channels = catalog.channels();
        let a = playlist(&catalog, "a").await;
        let b = playlist(&catalog, "b").await;

        // b is imported first, and a's rows land out of import order
        channels
            .replace_for_playlist(stage(b.id, vec![ChannelDescriptor::new("B0", "http://b/0")]))
            .await
            .unwrap();
        let mut staged = stage(
            a.id,
            vec![
                ChannelDescriptor::new("A0", "http://a/0"),
                ChannelDescriptor::new("A1", "http://a/1"),
                ChannelDescriptor::new("A2", "http://a/2"),
            ],
        );
        staged.rows.reverse();
        channels.insert_many(a.id, staged.rows).await.unwrap();

        let mut expected: Vec<(Uuid, &str)> =
            vec![(a.id, "A0"), (a.id, "A1"), (a.id, "A2"), (b.id, "B0")];
        expected.sort_by_key(|(playlist_id, _)| *playlist_id);
        let expected: Vec<&str> = expected.into_iter().map(|(_, name)| name).collect();

        let all = ChannelFilter {
            limit: 100,
            ..Default::default()
        };
        let names: Vec<String> = channels
            .list(&all)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, expected);

        let page = ChannelFilter {
            skip: 1,
            limit: 2,
            ..Default::default()
        };
        let names: Vec<String> = channels
            .list(&page)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, expected[1..3].to_vec());
    }

    #[tokio::test]
    async fn test_list_filters_and_distinct() {
        let catalog = MemoryCatalog::new();
        let a = playlist(&catalog, "a").await;
        let mut news = ChannelDescriptor::new("News", "http://a/news");
        news.category = "News".to_string();
        news.country = "BR".to_string();
        let sports = ChannelDescriptor::new("Sports", "http://a/sports");
        catalog
            .channels()
            .replace_for_playlist(stage(a.id, vec![news, sports]))
            .await
            .unwrap();

        let filter = ChannelFilter {
            category: Some("News".to_string()),
            limit: 100,
            ..Default::default()
        };
        let found = catalog.channels().list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "News");

        let categories = catalog
            .channels()
            .list_distinct(ChannelField::Category)
            .await
            .unwrap();
        assert_eq!(categories, vec!["General", "News"]);
        let countries = catalog
            .channels()
            .list_distinct(ChannelField::Country)
            .await
            .unwrap();
        assert_eq!(countries, vec!["BR", "Unknown"]);
    }
}
