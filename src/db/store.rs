//! Store traits consumed by the ingestion and streaming services
//!
//! The HTTP layer and services only see these traits; `Stores::postgres`
//! wires them to the repositories, `Stores::memory` to `MemoryCatalog`.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::memory::MemoryCatalog;
use crate::db::repository::{channels, media, playlists};
use crate::error::StoreError;
use crate::models::{
    ChannelField, ChannelFilter, ChannelRecord, MediaRecord, NewChannel, NewPlaylist,
    PlaylistSource, PlaylistSummary,
};
use crate::services::reconciler::StagedChannels;

/// Rows removed and inserted by a full replacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub removed: u64,
    pub inserted: u64,
}

#[async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn create(&self, playlist: NewPlaylist) -> Result<PlaylistSource, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PlaylistSource>, StoreError>;
    async fn list(&self) -> Result<Vec<PlaylistSummary>, StoreError>;
    /// Persist name/descriptor/active flag and bump `updated_at`
    async fn update(&self, playlist: &PlaylistSource) -> Result<bool, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChannelRecord>, StoreError>;
    async fn find_by_playlist(&self, playlist_id: Uuid) -> Result<Vec<ChannelRecord>, StoreError>;
    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<ChannelRecord>, StoreError>;
    async fn list_distinct(&self, field: ChannelField) -> Result<Vec<String>, StoreError>;
    async fn delete_by_playlist(&self, playlist_id: Uuid) -> Result<u64, StoreError>;
    async fn insert_many(
        &self,
        playlist_id: Uuid,
        channels: Vec<NewChannel>,
    ) -> Result<u64, StoreError>;
    /// Swap in a staged channel set; readers never observe a partial state
    async fn replace_for_playlist(
        &self,
        staged: StagedChannels,
    ) -> Result<ReplaceSummary, StoreError>;
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError>;
}

/// Store handles shared by the application
#[derive(Clone)]
pub struct Stores {
    pub playlists: Arc<dyn PlaylistStore>,
    pub channels: Arc<dyn ChannelStore>,
    pub media: Arc<dyn MediaStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            playlists: Arc::new(PgPlaylistStore { pool: pool.clone() }),
            channels: Arc::new(PgChannelStore { pool: pool.clone() }),
            media: Arc::new(PgMediaStore { pool }),
        }
    }

    pub fn memory(catalog: &MemoryCatalog) -> Self {
        Self {
            playlists: Arc::new(catalog.playlists()),
            channels: Arc::new(catalog.channels()),
            media: Arc::new(catalog.media()),
        }
    }
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

pub struct PgPlaylistStore {
    pool: PgPool,
}

#[async_trait]
impl PlaylistStore for PgPlaylistStore {
    async fn create(&self, playlist: NewPlaylist) -> Result<PlaylistSource, StoreError> {
        playlists::create_playlist(&self.pool, &playlist)
            .await?
            .try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PlaylistSource>, StoreError> {
        playlists::find_by_id(&self.pool, id)
            .await?
            .map(PlaylistSource::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<PlaylistSummary>, StoreError> {
        playlists::list_with_counts(&self.pool)
            .await?
            .into_iter()
            .map(PlaylistSummary::try_from)
            .collect()
    }

    async fn update(&self, playlist: &PlaylistSource) -> Result<bool, StoreError> {
        let affected = playlists::update_playlist(
            &self.pool,
            playlist.id,
            &playlist.name,
            &playlist.file_path,
            playlist.is_active,
        )
        .await?;

        Ok(affected > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(playlists::delete_playlist(&self.pool, id).await? > 0)
    }
}

pub struct PgChannelStore {
    pool: PgPool,
}

#[async_trait]
impl ChannelStore for PgChannelStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChannelRecord>, StoreError> {
        Ok(channels::find_by_id(&self.pool, id).await?.map(Into::into))
    }

    async fn find_by_playlist(&self, playlist_id: Uuid) -> Result<Vec<ChannelRecord>, StoreError> {
        let rows = channels::find_by_playlist(&self.pool, playlist_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list(&self, filter: &ChannelFilter) -> Result<Vec<ChannelRecord>, StoreError> {
        let rows = channels::list_active(&self.pool, filter).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_distinct(&self, field: ChannelField) -> Result<Vec<String>, StoreError> {
        Ok(channels::list_distinct(&self.pool, field).await?)
    }

    async fn delete_by_playlist(&self, playlist_id: Uuid) -> Result<u64, StoreError> {
        Ok(channels::delete_by_playlist(&self.pool, playlist_id).await?)
    }

    async fn insert_many(
        &self,
        playlist_id: Uuid,
        new_channels: Vec<NewChannel>,
    ) -> Result<u64, StoreError> {
        Ok(channels::insert_many(&self.pool, playlist_id, new_channels).await?)
    }

    async fn replace_for_playlist(
        &self,
        staged: StagedChannels,
    ) -> Result<ReplaceSummary, StoreError> {
        let playlist_id = staged.playlist_id;
        let (removed, inserted) =
            channels::replace_for_playlist(&self.pool, playlist_id, staged.rows).await?;

        Ok(ReplaceSummary { removed, inserted })
    }
}

pub struct PgMediaStore {
    pool: PgPool,
}

#[async_trait]
impl MediaStore for PgMediaStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaRecord>, StoreError> {
        Ok(media::find_by_id(&self.pool, id).await?.map(Into::into))
    }
}
