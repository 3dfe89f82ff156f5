use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::sync::record::{parse_timestamp, RawVideo};

/// Response from `channels.list?mine=true&part=contentDetails`.
#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    #[serde(default)]
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub likes: Option<String>,
}

impl ChannelListResponse {
    /// Id of the first channel's liked videos playlist.
    pub fn likes_playlist_id(self) -> Option<String> {
        self.items
            .into_iter()
            .find_map(|c| c.content_details?.related_playlists?.likes)
            .filter(|id| !id.is_empty())
    }
}

/// Response from `playlistItems.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    #[serde(default)]
    pub snippet: Option<PlaylistItemSnippet>,
    #[serde(default)]
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    /// When the item was added to the playlist, i.e. when the video was liked.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    #[serde(default)]
    pub video_id: Option<String>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        let from_details = self
            .content_details
            .as_ref()
            .and_then(|d| d.video_id.as_deref());
        let from_snippet = self
            .snippet
            .as_ref()
            .and_then(|s| s.resource_id.as_ref())
            .and_then(|r| r.video_id.as_deref());
        from_details.or(from_snippet).filter(|id| !id.is_empty())
    }

    pub fn liked_at(&self) -> Option<DateTime<Utc>> {
        self.snippet
            .as_ref()
            .and_then(|s| s.published_at.as_deref())
            .and_then(parse_timestamp)
    }
}

/// Response from `videos.list`.
#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<RawVideo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_list_likes_playlist() {
        let json = r#"{
            "kind": "youtube#channelListResponse",
            "items": [{
                "id": "UC123",
                "contentDetails": {
                    "relatedPlaylists": {"likes": "LL", "uploads": "UU123"}
                }
            }]
        }"#;
        let resp: ChannelListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.likes_playlist_id().as_deref(), Some("LL"));
    }

    #[test]
    fn test_channel_list_without_likes() {
        let resp: ChannelListResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(resp.likes_playlist_id().is_none());

        let json = r#"{"items": [{"contentDetails": {"relatedPlaylists": {"likes": ""}}}]}"#;
        let resp: ChannelListResponse = serde_json::from_str(json).unwrap();
        assert!(resp.likes_playlist_id().is_none());
    }

    #[test]
    fn test_playlist_items_full() {
        let json = r#"{
            "nextPageToken": "CDIQAA",
            "pageInfo": {"totalResults": 120, "resultsPerPage": 50},
            "items": [{
                "snippet": {
                    "publishedAt": "2024-05-01T12:00:00Z",
                    "title": "A video",
                    "resourceId": {"kind": "youtube#video", "videoId": "abc"}
                },
                "contentDetails": {"videoId": "abc", "videoPublishedAt": "2020-01-01T00:00:00Z"}
            }]
        }"#;
        let resp: PlaylistItemListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.next_page_token.as_deref(), Some("CDIQAA"));
        assert_eq!(resp.items.len(), 1);
        let item = &resp.items[0];
        assert_eq!(item.video_id(), Some("abc"));
        assert_eq!(
            item.liked_at().unwrap().to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_playlist_item_video_id_falls_back_to_snippet() {
        let json = r#"{"snippet": {"resourceId": {"videoId": "xyz"}}}"#;
        let item: PlaylistItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.video_id(), Some("xyz"));
        assert!(item.liked_at().is_none());
    }

    #[test]
    fn test_last_page_has_no_token() {
        let resp: PlaylistItemListResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(resp.next_page_token.is_none());
        assert!(resp.items.is_empty());
    }

    #[test]
    fn test_video_list() {
        let json = r#"{"items": [{"id": "abc", "snippet": {"title": "t"}}]}"#;
        let resp: VideoListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.items[0].id.as_deref(), Some("abc"));
    }
}
