use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use super::auth::Authenticator;
use super::error::ApiError;
use super::responses::{
    ChannelListResponse, PlaylistItem, PlaylistItemListResponse, VideoListResponse,
};
use crate::sync::record::RawVideo;
use crate::sync::source::check_page_size;
use crate::sync::{FetchError, Page, PageSource};

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

const DEFAULT_USER_AGENT: &str = concat!("likesync/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the OAuth and Data API calls.
pub fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// The authenticated user's liked videos, newest like first.
///
/// Each page is one `playlistItems.list` call on the likes playlist followed
/// by one `videos.list` call hydrating the listed ids.
pub struct YouTubeLikes {
    client: Client,
    auth: Authenticator,
    api_base: String,
    likes_playlist: OnceCell<String>,
}

impl YouTubeLikes {
    pub fn new(client: Client, auth: Authenticator) -> Self {
        Self {
            client,
            auth,
            api_base: API_BASE.to_string(),
            likes_playlist: OnceCell::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/{}", self.api_base, endpoint);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), endpoint, &body));
        }
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Looked up once per process.
    async fn likes_playlist_id(&self) -> Result<&str, ApiError> {
        let id = self
            .likes_playlist
            .get_or_try_init(|| async {
                let channels: ChannelListResponse = self
                    .get_json(
                        "channels",
                        &[
                            ("part", "contentDetails".to_string()),
                            ("mine", "true".to_string()),
                        ],
                    )
                    .await?;
                let id = channels.likes_playlist_id().ok_or(ApiError::NoLikesPlaylist)?;
                tracing::debug!(playlist_id = %id, "Resolved liked videos playlist");
                Ok::<_, ApiError>(id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Full video resources for `ids`, in the order given.
    ///
    /// Ids the API does not return (deleted or private videos) are dropped.
    async fn hydrate(&self, ids: &[String]) -> Result<Vec<RawVideo>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: VideoListResponse = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,contentDetails".to_string()),
                    ("id", ids.join(",")),
                    ("maxResults", ids.len().to_string()),
                ],
            )
            .await?;
        Ok(order_by_ids(ids, response.items))
    }
}

#[async_trait]
impl PageSource for YouTubeLikes {
    async fn fetch_page(
        &self,
        page_token: Option<&str>,
        after: Option<DateTime<Utc>>,
        page_size: u32,
    ) -> Result<Page, FetchError> {
        check_page_size(page_size)?;
        let playlist_id = self.likes_playlist_id().await?;

        let mut query = vec![
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let listing: PlaylistItemListResponse = self.get_json("playlistItems", &query).await?;

        let (ids, reached_cursor) = select_newer(&listing.items, after);
        let items = self.hydrate(&ids).await?;
        tracing::debug!(
            listed = listing.items.len(),
            newer = ids.len(),
            hydrated = items.len(),
            reached_cursor,
            "Fetched likes page"
        );

        let next_page_token = if reached_cursor {
            None
        } else {
            listing.next_page_token
        };
        Ok(Page {
            items,
            next_page_token,
        })
    }
}

/// Video ids of the items liked strictly after `after`.
///
/// The likes playlist is ordered newest like first, so the first item at or
/// before `after` means nothing further down is new; the returned flag is
/// then `true`. Items without a like time are kept.
fn select_newer(items: &[PlaylistItem], after: Option<DateTime<Utc>>) -> (Vec<String>, bool) {
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        if let (Some(after), Some(liked_at)) = (after, item.liked_at()) {
            if liked_at <= after {
                return (ids, true);
            }
        }
        if let Some(id) = item.video_id() {
            ids.push(id.to_string());
        }
    }
    (ids, false)
}

fn order_by_ids(ids: &[String], videos: Vec<RawVideo>) -> Vec<RawVideo> {
    let mut by_id: HashMap<String, RawVideo> = videos
        .into_iter()
        .filter_map(|v| Some((v.id.clone()?, v)))
        .collect();
    ids.iter()
        .filter_map(|id| {
            let video = by_id.remove(id);
            if video.is_none() {
                tracing::debug!(video_id = %id, "Liked video unavailable, skipping");
            }
            video
        })
        .collect()
}
