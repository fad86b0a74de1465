//! Stream proxy
//!
//! Live channels are relayed from their upstream URL through a bounded
//! channel fed by a spawned reader task; the task stops as soon as the client
//! goes away. Media files are served from the media root with single byte
//! range support.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::store::{ChannelStore, MediaStore};
use crate::error::AppError;
use crate::services::metrics::{ActiveStreamGuard, StreamKind};

const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const MPEG_TS_CONTENT_TYPE: &str = "video/mp2t";
const OCTET_STREAM: &str = "application/octet-stream";

lazy_static! {
    static ref RANGE_RE: Regex = Regex::new(r"^bytes=(\d*)-(\d*)$").unwrap();
}

/// Single range from a `Range: bytes=...` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `a-b`, both inclusive
    Bounded(u64, u64),
    /// `a-`
    From(u64),
    /// `-n`, the last n bytes
    Suffix(u64),
}

impl ByteRange {
    /// Malformed or multi-range headers are a validation error
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let malformed = || AppError::Validation(format!("Malformed Range header: {}", raw));

        let caps = RANGE_RE.captures(raw.trim()).ok_or_else(malformed)?;
        let start = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let end = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let number = |s: &str| s.parse::<u64>().map_err(|_| malformed());

        match (start.is_empty(), end.is_empty()) {
            (false, false) => {
                let (start, end) = (number(start)?, number(end)?);
                if start > end {
                    return Err(malformed());
                }
                Ok(ByteRange::Bounded(start, end))
            }
            (false, true) => Ok(ByteRange::From(number(start)?)),
            (true, false) => Ok(ByteRange::Suffix(number(end)?)),
            (true, true) => Err(malformed()),
        }
    }

    /// Inclusive `(start, end)` within a file of `size` bytes
    pub fn resolve(&self, size: u64) -> Result<(u64, u64), AppError> {
        let unsatisfiable = AppError::RangeNotSatisfiable { size };
        if size == 0 {
            return Err(unsatisfiable);
        }

        let last = size - 1;
        match *self {
            ByteRange::Bounded(start, _) | ByteRange::From(start) if start > last => {
                Err(unsatisfiable)
            }
            ByteRange::Bounded(start, end) => Ok((start, end.min(last))),
            ByteRange::From(start) => Ok((start, last)),
            ByteRange::Suffix(0) => Err(unsatisfiable),
            ByteRange::Suffix(n) => Ok((size.saturating_sub(n), last)),
        }
    }
}

/// Content type of a live upstream, from its URL path
pub fn live_content_type(url: &str) -> &'static str {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase(),
    };

    if path.ends_with(".m3u8") {
        HLS_CONTENT_TYPE
    } else {
        MPEG_TS_CONTENT_TYPE
    }
}

/// Content type of a media file, from its extension
pub fn media_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("ts") => MPEG_TS_CONTENT_TYPE,
        Some("m3u8") => HLS_CONTENT_TYPE,
        Some("mp3") => "audio/mpeg",
        Some("aac") => "audio/aac",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",
        _ => OCTET_STREAM,
    }
}

/// Join a stored relative path onto the media root
///
/// `None` for absolute paths or anything that climbs out of the root.
pub fn resolve_media_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let mut resolved = root.to_path_buf();

    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if resolved == root {
        None
    } else {
        Some(resolved)
    }
}

/// Streaming response ready to hand to the HTTP layer
pub struct StreamResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub accept_ranges: bool,
    pub body: Body,
}

impl IntoResponse for StreamResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        if let Some(length) = self.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }
        if let Some(range) = self.content_range.and_then(|r| HeaderValue::from_str(&r).ok()) {
            headers.insert(header::CONTENT_RANGE, range);
        }
        if self.accept_ranges {
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        } else {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }

        (self.status, headers, self.body).into_response()
    }
}

pub struct StreamProxy {
    channels: Arc<dyn ChannelStore>,
    media: Arc<dyn MediaStore>,
    http: Client,
    media_root: PathBuf,
    relay_buffer: usize,
    connect_timeout: Duration,
}

impl StreamProxy {
    pub fn new(
        channels: Arc<dyn ChannelStore>,
        media: Arc<dyn MediaStore>,
        http: Client,
        config: &Config,
    ) -> Self {
        Self {
            channels,
            media,
            http,
            media_root: config.media_path.clone(),
            relay_buffer: config.relay_buffer_chunks.max(1),
            connect_timeout: Duration::from_millis(config.upstream_connect_timeout_ms),
        }
    }

    /// Upstream client: bounded connect, no read timeout
    pub fn build_http(config: &Config) -> reqwest::Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_millis(config.upstream_connect_timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
    }

    /// Relay a live channel
    ///
    /// Inactive channels are rejected before any upstream I/O. The connect
    /// timeout covers everything up to the response headers; the body has
    /// no read timeout.
    pub async fn open_stream(&self, channel_id: Uuid) -> Result<StreamResponse, AppError> {
        let channel = self
            .channels
            .find_by_id(channel_id)
            .await?
            .ok_or_else(|| AppError::not_found("Channel"))?;

        if !channel.is_active {
            return Err(AppError::InvalidState("Channel is not active".into()));
        }

        let request = self.http.get(&channel.url).send();
        let upstream = match tokio::time::timeout(self.connect_timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(channel_id = %channel.id, "Upstream connect failed: {}", e);
                return Err(AppError::Upstream {
                    message: format!("Failed to connect to channel upstream: {}", e),
                    timed_out: e.is_timeout(),
                });
            }
            Err(_) => {
                warn!(
                    channel_id = %channel.id,
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Upstream did not answer in time"
                );
                return Err(AppError::Upstream {
                    message: "Channel upstream did not respond in time".into(),
                    timed_out: true,
                });
            }
        };

        let status = upstream.status();
        if !status.is_success() {
            warn!(channel_id = %channel.id, status = status.as_u16(), "Upstream rejected stream");
            return Err(AppError::upstream(format!(
                "Channel upstream returned HTTP {}",
                status.as_u16()
            )));
        }

        info!(channel_id = %channel.id, name = %channel.name, "Live relay started");

        let (tx, rx) = mpsc::channel(self.relay_buffer);
        let guard = ActiveStreamGuard::new(StreamKind::Live);
        tokio::spawn(relay(upstream.bytes_stream(), tx, guard, channel.id));

        Ok(StreamResponse {
            status: StatusCode::OK,
            content_type: live_content_type(&channel.url),
            content_length: None,
            content_range: None,
            accept_ranges: false,
            body: Body::from_stream(ReceiverStream::new(rx)),
        })
    }

    /// Serve a media file, optionally a single byte range of it
    pub async fn open_media(
        &self,
        media_id: Uuid,
        range: Option<&str>,
    ) -> Result<StreamResponse, AppError> {
        let record = self
            .media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| AppError::not_found("Media"))?;

        let path = resolve_media_path(&self.media_root, &record.file_path).ok_or_else(|| {
            warn!(media_id = %media_id, path = %record.file_path, "Rejected media path");
            AppError::not_found("Media file")
        })?;

        // Parse before touching the file so a bad header is always a 400
        let range = range.map(ByteRange::parse).transpose()?;

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::not_found("Media file"))
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            warn!(media_id = %media_id, path = %record.file_path, "Media path is not a file");
            return Err(AppError::not_found("Media file"));
        }
        let size = metadata.len();
        let content_type = media_content_type(&path);

        let (status, start, length, content_range) = match range {
            Some(range) => {
                let (start, end) = range.resolve(size)?;
                (
                    StatusCode::PARTIAL_CONTENT,
                    start,
                    end - start + 1,
                    Some(format!("bytes {}-{}/{}", start, end, size)),
                )
            }
            None => (StatusCode::OK, 0, size, None),
        };

        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        debug!(media_id = %media_id, start, length, size, "Serving media");

        let guard = ActiveStreamGuard::new(StreamKind::Media);
        let stream = ReaderStream::new(file.take(length)).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                guard.record_bytes(bytes.len());
            }
            chunk
        });

        Ok(StreamResponse {
            status,
            content_type,
            content_length: Some(length),
            content_range,
            accept_ranges: true,
            body: Body::from_stream(stream),
        })
    }
}

/// Copy upstream chunks into `tx` until either side finishes
async fn relay<S, E>(
    upstream: S,
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    guard: ActiveStreamGuard,
    channel_id: Uuid,
) where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    tokio::pin!(upstream);

    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(channel_id = %channel_id, "Client disconnected, stopping relay");
                break;
            }
            next = upstream.next() => match next {
                Some(Ok(chunk)) => {
                    guard.record_bytes(chunk.len());
                    if tx.send(Ok(chunk)).await.is_err() {
                        debug!(channel_id = %channel_id, "Client disconnected, stopping relay");
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(channel_id = %channel_id, "Upstream read failed: {}", e);
                    let _ = tx.send(Err(std::io::Error::new(std::io::ErrorKind::Other, e))).await;
                    break;
                }
                None => {
                    debug!(channel_id = %channel_id, "Upstream ended");
                    break;
                }
            }
        }
    }
}
