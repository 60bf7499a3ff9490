//! Feed 客户端
//!
//! 拉取播放列表（最新在前）并给每个视频分类：直播 / 短视频 / 普通视频。
//! 分类是逐个视频的网络请求，由引擎按顺序调用。

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Classification, FeedItem};

/// Feed 数据源
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// 拉取一页视频，最新在前
    async fn fetch_page(&self, feed_id: &str, max_results: u32) -> Result<Vec<FeedItem>>;

    /// 给视频分类
    ///
    /// 出错表示分类未知，调用方必须停止本页扫描。
    async fn classify(&self, item: &FeedItem) -> Result<Classification>;
}

#[cfg(feature = "youtube")]
pub use youtube::YouTubeClient;

#[cfg(feature = "youtube")]
mod youtube {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Client;
    use serde::Deserialize;

    use super::FeedClient;
    use crate::config::FeedConfig;
    use crate::error::{Error, Result};
    use crate::types::{Classification, FeedItem};

    #[derive(Debug, Deserialize)]
    struct ListResponse {
        #[serde(default)]
        items: Vec<serde_json::Value>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PlaylistItem {
        snippet: PlaylistSnippet,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PlaylistSnippet {
        #[serde(default)]
        title: String,
        #[serde(default)]
        published_at: Option<String>,
        resource_id: ResourceId,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ResourceId {
        video_id: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Video {
        snippet: VideoSnippet,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct VideoSnippet {
        #[serde(default)]
        live_broadcast_content: Option<String>,
    }

    /// YouTube Data API v3 客户端
    pub struct YouTubeClient {
        client: Client,
        api_key: String,
        api_base: String,
        shorts_base: String,
    }

    impl YouTubeClient {
        pub fn new(config: &FeedConfig) -> Result<Self> {
            let client = Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(30))
                .build()?;

            Ok(Self {
                client,
                api_key: config.api_key.clone(),
                api_base: config.api_base.trim_end_matches('/').to_string(),
                shorts_base: config.shorts_base.trim_end_matches('/').to_string(),
            })
        }

        /// 是否是直播（包括预告）
        ///
        /// `liveBroadcastContent` 缺失或为 `none` 才是普通视频；查不到视频记录时也不可发布。
        async fn is_live(&self, video_id: &str) -> Result<bool> {
            let resp = self
                .client
                .get(format!("{}/videos", self.api_base))
                .query(&[
                    ("part", "snippet"),
                    ("id", video_id),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| Error::classification(video_id, e))?;

            let body: ListResponse = resp
                .json()
                .await
                .map_err(|e| Error::classification(video_id, e))?;

            let Some(first) = body.items.into_iter().next() else {
                tracing::debug!("Video {} not found in videos.list", video_id);
                return Ok(true);
            };

            let video: Video = serde_json::from_value(first)
                .map_err(|e| Error::classification(video_id, e))?;

            Ok(!matches!(
                video.snippet.live_broadcast_content.as_deref(),
                None | Some("none")
            ))
        }

        /// 是否是短视频
        ///
        /// 请求 `/shorts/{id}`，普通视频会被重定向到 `/watch`，短视频停留在 `/shorts/` 下。
        async fn is_short(&self, video_id: &str) -> Result<bool> {
            let prefix = format!("{}/shorts/", self.shorts_base);
            let resp = self
                .client
                .get(format!("{}{}", prefix, video_id))
                .send()
                .await
                .map_err(|e| Error::classification(video_id, e))?;

            Ok(resp.url().as_str().starts_with(&prefix))
        }
    }

    #[async_trait]
    impl FeedClient for YouTubeClient {
        async fn fetch_page(&self, feed_id: &str, max_results: u32) -> Result<Vec<FeedItem>> {
            let max_results = max_results.to_string();
            let resp = self
                .client
                .get(format!("{}/playlistItems", self.api_base))
                .query(&[
                    ("part", "snippet"),
                    ("playlistId", feed_id),
                    ("maxResults", max_results.as_str()),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Feed(format!("playlistItems {}: {}", status, body)));
            }

            let body: ListResponse = resp.json().await?;
            let mut items = Vec::with_capacity(body.items.len());
            for (position, raw) in body.items.into_iter().enumerate() {
                let parsed: PlaylistItem = serde_json::from_value(raw.clone())
                    .map_err(|e| Error::Feed(format!("invalid playlist item #{}: {}", position, e)))?;
                items.push(FeedItem {
                    id: parsed.snippet.resource_id.video_id,
                    title: parsed.snippet.title,
                    position,
                    published_at: parsed.snippet.published_at,
                    raw,
                });
            }

            tracing::debug!("Fetched {} items from playlist {}", items.len(), feed_id);
            Ok(items)
        }

        async fn classify(&self, item: &FeedItem) -> Result<Classification> {
            if self.is_live(&item.id).await? {
                return Ok(Classification::Live);
            }
            if self.is_short(&item.id).await? {
                return Ok(Classification::Short);
            }
            Ok(Classification::Eligible)
        }
    }
}
