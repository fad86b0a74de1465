use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::channel::MAX_CHANNEL_PAGE;
use crate::models::{ChannelField, ChannelFilter, ChannelResponse};
use crate::AppState;

/// GET /api/live-tv/channels - Active channels, filtered and paginated
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ChannelFilter>,
) -> Result<Json<Vec<ChannelResponse>>, AppError> {
    if filter.limit == 0 || filter.limit > MAX_CHANNEL_PAGE {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_CHANNEL_PAGE
        )));
    }

    let channels = state.stores.channels.list(&filter).await?;
    Ok(Json(channels.into_iter().map(ChannelResponse::from).collect()))
}

/// GET /api/live-tv/channels/:id
pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChannelResponse>, AppError> {
    let channel = state
        .stores
        .channels
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel"))?;

    Ok(Json(channel.into()))
}

/// GET /api/live-tv/channels/:id/stream - Relay the channel's upstream
pub async fn stream_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.proxy.open_stream(id).await
}

async fn distinct(state: &AppState, field: ChannelField) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.stores.channels.list_distinct(field).await?))
}

/// GET /api/live-tv/categories
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    distinct(&state, ChannelField::Category).await
}

/// GET /api/live-tv/languages
pub async fn get_languages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    distinct(&state, ChannelField::Language).await
}

/// GET /api/live-tv/countries
pub async fn get_countries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    distinct(&state, ChannelField::Country).await
}
