//! Xtream Codes API Client
//!
//! Fetches the live listing of a panel and maps it to channel descriptors.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::types::{XtreamCredentials, XtreamLiveEntry};
use crate::config::Config;
use crate::models::channel::ChannelDescriptor;

/// Xtream API Error types
#[derive(Debug, Error)]
pub enum XtreamError {
    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP error (non-2xx status)
    #[error("HTTP error: {0}")]
    Http(u16),
    /// Body is not a JSON array
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for XtreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            XtreamError::Timeout
        } else {
            XtreamError::Network(err.to_string())
        }
    }
}

/// Result of one live listing fetch
#[derive(Debug, Clone, Default)]
pub struct XtreamFetch {
    pub channels: Vec<ChannelDescriptor>,
    /// Entries without a usable stream URL
    pub skipped: usize,
}

/// Xtream API Client
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct XtreamClient {
    http: Client,
}

impl XtreamClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// HTTP client with the configured request timeout and user agent
    pub fn from_config(config: &Config) -> Result<Self, XtreamError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.xtream_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self::new(http))
    }

    /// `GET {server}/live/{username}/{password}`
    pub async fn fetch_live_channels(
        &self,
        creds: &XtreamCredentials,
    ) -> Result<XtreamFetch, XtreamError> {
        debug!(server = %creds.server, user = %creds.username, "Xtream live listing request");

        let response = self.http.get(creds.live_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(server = %creds.server, status = status.as_u16(), "Xtream panel rejected request");
            return Err(XtreamError::Http(status.as_u16()));
        }

        let text = response.text().await?;
        let entries: Vec<serde_json::Value> = serde_json::from_str(&text).map_err(|e| {
            error!(server = %creds.server, "Failed to parse Xtream live listing: {}", e);
            debug!("Response text: {}", truncate(&text, 500));
            XtreamError::Parse(e.to_string())
        })?;

        Ok(map_entries(entries))
    }
}

fn map_entries(entries: Vec<serde_json::Value>) -> XtreamFetch {
    let mut fetch = XtreamFetch::default();

    for value in entries {
        let descriptor = serde_json::from_value::<XtreamLiveEntry>(value)
            .ok()
            .and_then(XtreamLiveEntry::into_descriptor);

        match descriptor {
            Some(descriptor) => fetch.channels.push(descriptor),
            None => fetch.skipped += 1,
        }
    }

    fetch
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
