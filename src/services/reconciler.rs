//! Full-replace reconciliation of a playlist's channel catalog
//!
//! Descriptors are staged first (ids and order fixed up front), then handed to
//! the store, which swaps them in atomically. Channel ids do not survive a
//! refresh.

use tracing::info;
use uuid::Uuid;

use crate::db::store::{ChannelStore, ReplaceSummary};
use crate::error::StoreError;
use crate::models::{ChannelDescriptor, NewChannel};

/// Rows ready to replace a playlist's current channels
#[derive(Debug, Clone)]
pub struct StagedChannels {
    pub playlist_id: Uuid,
    pub rows: Vec<NewChannel>,
}

impl StagedChannels {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Assign fresh ids and keep parser order as `sort_order`
pub fn stage<I>(playlist_id: Uuid, descriptors: I) -> StagedChannels
where
    I: IntoIterator<Item = ChannelDescriptor>,
{
    let rows = descriptors
        .into_iter()
        .enumerate()
        .map(|(index, descriptor)| NewChannel {
            id: Uuid::new_v4(),
            descriptor,
            sort_order: i32::try_from(index).unwrap_or(i32::MAX),
        })
        .collect();

    StagedChannels { playlist_id, rows }
}

/// Replace the channels of `playlist_id` with `descriptors`
pub async fn reconcile<I>(
    store: &dyn ChannelStore,
    playlist_id: Uuid,
    descriptors: I,
) -> Result<ReplaceSummary, StoreError>
where
    I: IntoIterator<Item = ChannelDescriptor>,
{
    let staged = stage(playlist_id, descriptors);
    let summary = store.replace_for_playlist(staged).await?;

    info!(
        playlist_id = %playlist_id,
        removed = summary.removed,
        inserted = summary.inserted,
        "Channel catalog replaced"
    );

    Ok(summary)
}
