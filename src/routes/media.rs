use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// GET /api/media/:id/stream - Serve a media file, honoring `Range`
pub async fn stream_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let range = match headers.get(header::RANGE) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AppError::Validation("Malformed Range header".into()))?,
        ),
        None => None,
    };

    state.proxy.open_media(id, range).await
}
