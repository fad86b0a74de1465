//! Playlist management endpoints
//!
//! Mutations require an admin identity. A source that cannot be read does not
//! fail the request: the response carries `status: "degraded"` and the
//! `upstream_error` text instead.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{PlaylistSummary, PlaylistType};
use crate::services::xtream::XtreamCredentials;
use crate::services::{CurrentUser, IngestOutcome};
use crate::AppState;

/// `name` and `playlist_type` may also arrive as multipart fields
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub name: Option<String>,
    pub playlist_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct XtreamRequest {
    pub name: String,
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Result of an upload, registration or refresh
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_type: Option<PlaylistType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub status: &'static str,
    pub message: String,
    pub channel_count: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<String>,
}

impl IngestResponse {
    fn new(outcome: IngestOutcome, success: &str, degraded: &str) -> Self {
        let is_degraded = outcome.is_degraded();
        Self {
            id: Some(outcome.playlist.id),
            name: Some(outcome.playlist.name),
            playlist_type: Some(outcome.playlist.playlist_type),
            file_path: None,
            status: if is_degraded { "degraded" } else { "ok" },
            message: if is_degraded { degraded } else { success }.to_string(),
            channel_count: outcome.channel_count,
            skipped: outcome.skipped,
            upstream_error: outcome.upstream_error,
        }
    }
}

/// GET /api/playlists - All playlists with their channel counts
pub async fn list_playlists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PlaylistSummary>>, AppError> {
    Ok(Json(state.stores.playlists.list().await?))
}

/// POST /api/playlists/upload - Store an M3U file and import its channels
pub async fn upload_playlist(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    user.require_admin()?;

    let mut name = query.name;
    let mut playlist_type = query.playlist_type;
    let mut payload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let read_error = |e: axum::extract::multipart::MultipartError| {
            AppError::Validation(format!("Failed to read field '{}': {}", field_name, e))
        };

        match field_name.as_str() {
            "file" => payload = Some(field.bytes().await.map_err(read_error)?),
            "name" => name = Some(field.text().await.map_err(read_error)?),
            "playlist_type" => playlist_type = Some(field.text().await.map_err(read_error)?),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| AppError::Validation("Missing playlist name".into()))?;
    let playlist_type =
        playlist_type.ok_or_else(|| AppError::Validation("Missing playlist type".into()))?;
    let payload = payload.ok_or_else(|| AppError::Validation("Missing 'file' part".into()))?;

    let outcome = state
        .ingest
        .ingest_upload(&name, &playlist_type, &payload)
        .await?;

    let file_path = outcome.playlist.file_path.clone();
    let mut response = IngestResponse::new(
        outcome,
        "Playlist uploaded and parsed successfully",
        "Playlist uploaded, but its channels could not be read",
    );
    response.file_path = Some(file_path);

    Ok(Json(response))
}

/// POST /api/playlists/xtream - Register an Xtream Codes source
pub async fn add_xtream_playlist(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Json(request): Json<XtreamRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    user.require_admin()?;

    let credentials = XtreamCredentials::new(request.url, request.username, request.password)?;
    let outcome = state.ingest.ingest_remote(&request.name, credentials).await?;

    Ok(Json(IngestResponse::new(
        outcome,
        "Xtream Codes playlist added successfully",
        "Xtream Codes playlist added, but its channels could not be fetched",
    )))
}

/// POST /api/playlists/:id/refresh - Re-import a playlist's channels
pub async fn refresh_playlist(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<IngestResponse>, AppError> {
    user.require_admin()?;

    let outcome = state.ingest.refresh(id).await?;
    let mut response = IngestResponse::new(
        outcome,
        "Playlist refreshed successfully",
        "Playlist source unavailable, existing channels kept",
    );
    response.id = None;
    response.name = None;
    response.playlist_type = None;

    Ok(Json(response))
}

/// DELETE /api/playlists/:id - Remove a playlist and its channels
pub async fn delete_playlist(
    user: CurrentUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    user.require_admin()?;

    state.ingest.delete(id).await?;

    Ok(Json(serde_json::json!({
        "message": "Playlist deleted successfully"
    })))
}
