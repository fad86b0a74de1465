use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_LANGUAGE: &str = "Unknown";
pub const DEFAULT_COUNTRY: &str = "Unknown";
pub const DEFAULT_NAME: &str = "Unknown";

/// Transient channel produced by a parser, before persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub category: String,
    pub language: String,
    pub country: String,
}

impl ChannelDescriptor {
    /// Descriptor with the sentinel category/language/country
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            logo_url: None,
            category: DEFAULT_CATEGORY.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

/// Persisted channel owned by exactly one playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: Uuid,
    pub playlist_id: Uuid,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub category: String,
    pub language: String,
    pub country: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl ChannelRecord {
    pub fn descriptor(&self) -> ChannelDescriptor {
        ChannelDescriptor {
            name: self.name.clone(),
            url: self.url.clone(),
            logo_url: self.logo_url.clone(),
            category: self.category.clone(),
            language: self.language.clone(),
            country: self.country.clone(),
        }
    }
}

/// Channel row staged for insertion
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub id: Uuid,
    pub descriptor: ChannelDescriptor,
    pub sort_order: i32,
}

impl NewChannel {
    pub fn into_record(self, playlist_id: Uuid, created_at: DateTime<Utc>) -> ChannelRecord {
        let d = self.descriptor;
        ChannelRecord {
            id: self.id,
            playlist_id,
            name: d.name,
            url: d.url,
            logo_url: d.logo_url,
            category: d.category,
            language: d.language,
            country: d.country,
            is_active: true,
            sort_order: self.sort_order,
            created_at,
        }
    }
}

/// Column usable for distinct-value filter lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelField {
    Category,
    Language,
    Country,
}

impl ChannelField {
    pub fn column(&self) -> &'static str {
        match self {
            ChannelField::Category => "category",
            ChannelField::Language => "language",
            ChannelField::Country => "country",
        }
    }

    pub fn value<'a>(&self, record: &'a ChannelRecord) -> &'a str {
        match self {
            ChannelField::Category => &record.category,
            ChannelField::Language => &record.language,
            ChannelField::Country => &record.country,
        }
    }
}

/// Listing filter for active channels
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelFilter {
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub const MAX_CHANNEL_PAGE: usize = 1000;

fn default_limit() -> usize {
    100
}

impl Default for ChannelFilter {
    fn default() -> Self {
        Self {
            category: None,
            language: None,
            country: None,
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl ChannelFilter {
    pub fn matches(&self, record: &ChannelRecord) -> bool {
        record.is_active
            && self.category.as_deref().map_or(true, |c| c == record.category)
            && self.language.as_deref().map_or(true, |l| l == record.language)
            && self.country.as_deref().map_or(true, |c| c == record.country)
    }
}

/// Channel as returned by the listing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    pub category: String,
    pub language: String,
    pub country: String,
    pub is_active: bool,
}

impl From<ChannelRecord> for ChannelResponse {
    fn from(record: ChannelRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            logo_url: record.logo_url,
            category: record.category,
            language: record.language,
            country: record.country,
            is_active: record.is_active,
        }
    }
}
