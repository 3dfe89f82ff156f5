//! Raw video resources as served by the platform, and their normalization
//! into [`MediaRecord`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::source::FetchError;
use crate::state::MediaRecord;

/// A video resource as returned by `videos.list`.
///
/// Every field is optional at this layer; [`MediaRecord::try_from`] decides
/// which ones are required.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawVideo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub snippet: Option<RawSnippet>,
    #[serde(default)]
    pub content_details: Option<RawContentDetails>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawSnippet {
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub thumbnails: RawThumbnails,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawThumbnails {
    #[serde(default)]
    pub default: Option<RawThumbnail>,
    #[serde(default)]
    pub medium: Option<RawThumbnail>,
    #[serde(default)]
    pub high: Option<RawThumbnail>,
}

impl RawThumbnails {
    /// The medium thumbnail, falling back to the other sizes.
    fn preferred_url(&self) -> Option<&str> {
        [&self.medium, &self.default, &self.high]
            .into_iter()
            .flatten()
            .map(|t| t.url.as_str())
            .next()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawThumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawContentDetails {
    #[serde(default)]
    pub duration: Option<String>,
}

/// Parse an RFC 3339 timestamp as served by the platform.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl TryFrom<RawVideo> for MediaRecord {
    type Error = FetchError;

    /// Normalize a raw video. `id` and `snippet.publishedAt` are required;
    /// text fields default to empty.
    fn try_from(raw: RawVideo) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FetchError::MalformedPage("video without an id".to_string()))?;

        let snippet = raw
            .snippet
            .ok_or_else(|| FetchError::MalformedPage(format!("video {id} has no snippet")))?;

        let published_at = snippet
            .published_at
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| {
                FetchError::MalformedPage(format!(
                    "video {id} has a missing or invalid publishedAt: {:?}",
                    snippet.published_at
                ))
            })?;

        let thumbnail_url = snippet
            .thumbnails
            .preferred_url()
            .unwrap_or_default()
            .to_string();

        Ok(MediaRecord {
            id,
            title: snippet.title.unwrap_or_default(),
            description: snippet.description.unwrap_or_default(),
            channel_title: snippet.channel_title.unwrap_or_default(),
            thumbnail_url,
            tags: snippet.tags,
            category_id: snippet.category_id.unwrap_or_default(),
            duration: raw
                .content_details
                .and_then(|cd| cd.duration)
                .unwrap_or_default(),
            published_at,
        })
    }
}
