//! Xtream Codes Types
//!
//! Credentials, the connection descriptor they encode to, and the live
//! listing entries returned by the panel.

use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::error::AppError;
use crate::models::channel::{ChannelDescriptor, DEFAULT_NAME};

/// Scheme prefix of an Xtream connection descriptor
pub const XTREAM_SCHEME: &str = "xtream://";

/// Credentials of an Xtream panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    pub username: String,
    pub password: String,
}

impl XtreamCredentials {
    /// Validated credentials, stored exactly as given
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AppError> {
        let server = server.into();
        let username = username.into();
        let password = password.into();

        if server.is_empty() {
            return Err(AppError::Validation("Xtream server URL is required".into()));
        }
        if username.is_empty() {
            return Err(AppError::Validation("Xtream username is required".into()));
        }
        if username.contains('/') || password.contains('/') {
            return Err(AppError::Validation(
                "Xtream username and password must not contain '/'".into(),
            ));
        }

        Ok(Self {
            server,
            username,
            password,
        })
    }

    /// `xtream://{server}/{username}/{password}`
    pub fn to_connection_string(&self) -> String {
        format!(
            "{}{}/{}/{}",
            XTREAM_SCHEME, self.server, self.username, self.password
        )
    }

    /// Live listing endpoint
    pub fn live_url(&self) -> String {
        format!(
            "{}/live/{}/{}",
            self.server.trim_end_matches('/'),
            self.username,
            self.password
        )
    }
}

impl FromStr for XtreamCredentials {
    type Err = AppError;

    /// Splits from the right so the server part may itself contain `/`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let rest = raw.strip_prefix(XTREAM_SCHEME).ok_or_else(|| {
            AppError::Validation(format!("Not an Xtream descriptor: {}", raw))
        })?;

        let mut parts = rest.rsplitn(3, '/');
        let password = parts.next();
        let username = parts.next();
        let server = parts.next();

        match (server, username, password) {
            (Some(server), Some(username), Some(password)) => {
                Self::new(server, username, password)
            }
            _ => Err(AppError::Validation(
                "Malformed Xtream descriptor, expected xtream://{url}/{username}/{password}"
                    .into(),
            )),
        }
    }
}

// ============================================================================
// Live listing
// ============================================================================

/// Accept strings, numbers and booleans; null or empty means absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let text = match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => return Ok(None),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// One entry of the live listing
#[derive(Debug, Deserialize, Clone, Default)]
pub struct XtreamLiveEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
}

impl XtreamLiveEntry {
    /// `None` when the entry has no stream URL
    pub fn into_descriptor(self) -> Option<ChannelDescriptor> {
        let url = self.url?;
        let mut descriptor =
            ChannelDescriptor::new(self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()), url);

        descriptor.logo_url = self.logo;
        if let Some(category) = self.category_name {
            descriptor.category = category;
        }
        if let Some(language) = self.language {
            descriptor.language = language;
        }
        if let Some(country) = self.country {
            descriptor.country = country;
        }

        Some(descriptor)
    }
}
