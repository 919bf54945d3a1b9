//! YouTube Data API v3 search client.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::errors::{RetryConfig, check_response, with_retry};
use super::{VideoResult, VideoSearch};
use crate::config::YouTubeConfig;
use crate::telemetry;
use crate::utils::http::http_client;

const REQUEST_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    #[serde(default, rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "channelTitle")]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchItem {
    /// Channels and playlists carry no video id and are dropped.
    fn into_result(self) -> Option<VideoResult> {
        let video_id = self.id.video_id.filter(|id| !id.is_empty())?;
        let Snippet {
            title,
            description,
            channel_title,
            thumbnails,
        } = self.snippet;
        let thumbnail_url = thumbnails
            .high
            .or(thumbnails.medium)
            .or(thumbnails.default)
            .map_or_else(
                || format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id),
                |t| t.url,
            );
        Some(VideoResult {
            url: watch_url(&video_id),
            title: html_escape::decode_html_entities(&title).into_owned(),
            description: html_escape::decode_html_entities(&description).into_owned(),
            channel_title: html_escape::decode_html_entities(&channel_title).into_owned(),
            thumbnail_url,
            video_id,
        })
    }
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub struct YouTubeClient {
    api_key: String,
    base_url: String,
    max_results: u32,
    client: Client,
    retry: RetryConfig,
}

impl YouTubeClient {
    pub fn new(config: &YouTubeConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            client: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            retry: RetryConfig::default(),
        }
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search(&self, query: &str) -> Result<Vec<VideoResult>> {
        if self.api_key.is_empty() {
            bail!("YouTube API key not configured");
        }
        let url = format!("{}/search", self.base_url);
        let query_params = [
            ("part", "snippet".to_string()),
            ("q", query.to_string()),
            ("key", self.api_key.clone()),
            ("type", "video".to_string()),
            ("order", "relevance".to_string()),
            ("maxResults", self.max_results.to_string()),
        ];

        telemetry::record_video_search();
        let client = &self.client;
        let (url, query_params) = (&url, &query_params);
        let json = with_retry(self.retry, "YouTube", move || async move {
            let resp = client
                .get(url)
                .query(query_params)
                .send()
                .await
                .context("Failed to send request to YouTube search")?;
            check_response(resp, "YouTube").await
        })
        .await?;

        let parsed: SearchResponse =
            serde_json::from_value(json).context("Unexpected YouTube search shape")?;
        let results: Vec<VideoResult> = parsed
            .items
            .into_iter()
            .filter_map(SearchItem::into_result)
            .collect();
        debug!("youtube search returned {} videos", results.len());
        Ok(results)
    }
}
