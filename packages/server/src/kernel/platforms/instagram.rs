use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{MediaStatus, PlatformClient, PublishableMedia, PublishedMedia};
use crate::common::{PipelineError, Platform};
use crate::kernel::http;

const GRAPH_API_URL: &str = "https://graph.facebook.com/v18.0";
const PROVIDER: &str = "instagram";

/// Instagram Graph API client publishing videos as Reels.
pub struct InstagramClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermalinkResponse {
    #[serde(default)]
    permalink: Option<String>,
}

impl InstagramClient {
    pub fn new(access_token: Option<String>, account_id: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(60))?,
            base_url: GRAPH_API_URL.to_string(),
            access_token,
            account_id,
        })
    }

    /// Point the client at another Graph API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| PipelineError::configuration("Instagram API credentials not configured"))?;
        let account = self.account_id.as_deref().ok_or_else(|| {
            PipelineError::configuration("Instagram Business Account ID not configured")
        })?;
        Ok((token, account))
    }
}

/// Caption text followed by a blank line and the hashtags.
///
/// Tags are normalized to a single leading `#`; empty tags are dropped.
pub fn format_caption(caption: &str, hashtags: &[String]) -> String {
    let tags: Vec<String> = hashtags
        .iter()
        .map(|t| t.trim().trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .map(|t| format!("#{}", t))
        .collect();

    if tags.is_empty() {
        caption.to_string()
    } else {
        format!("{}\n\n{}", caption, tags.join(" "))
    }
}

fn parse_status(response: StatusResponse) -> MediaStatus {
    match response.status_code.as_deref() {
        Some("FINISHED") | Some("PUBLISHED") => MediaStatus::Finished,
        Some("ERROR") | Some("EXPIRED") => MediaStatus::Error(
            response
                .status
                .unwrap_or_else(|| "Video processing failed".to_string()),
        ),
        _ => MediaStatus::InProgress,
    }
}

#[async_trait]
impl PlatformClient for InstagramClient {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn submit_media(&self, media: &PublishableMedia) -> Result<String> {
        let (token, account) = self.credentials()?;
        let text = if media.description.trim().is_empty() {
            media.title.as_str()
        } else {
            media.description.as_str()
        };

        let mut body = json!({
            "media_type": "REELS",
            "video_url": media.video_url,
            "caption": format_caption(text, &media.hashtags),
            "access_token": token,
        });
        if let Some(thumbnail) = &media.thumbnail_url {
            body["cover_url"] = json!(thumbnail);
        }

        let created: IdResponse = http::json(
            PROVIDER,
            self.client
                .post(format!("{}/{}/media", self.base_url, account))
                .json(&body)
                .send()
                .await,
        )
        .await?;

        debug!(container_id = %created.id, "instagram container created");
        Ok(created.id)
    }

    async fn poll_status(&self, container_id: &str) -> Result<MediaStatus> {
        let (token, _) = self.credentials()?;

        let response: StatusResponse = http::json(
            PROVIDER,
            self.client
                .get(format!("{}/{}", self.base_url, container_id))
                .query(&[("fields", "status_code,status"), ("access_token", token)])
                .send()
                .await,
        )
        .await?;

        Ok(parse_status(response))
    }

    async fn publish(&self, container_id: &str) -> Result<PublishedMedia> {
        let (token, account) = self.credentials()?;

        let published: IdResponse = http::json(
            PROVIDER,
            self.client
                .post(format!("{}/{}/media_publish", self.base_url, account))
                .json(&json!({ "creation_id": container_id, "access_token": token }))
                .send()
                .await,
        )
        .await?;

        let info: PermalinkResponse = http::json(
            PROVIDER,
            self.client
                .get(format!("{}/{}", self.base_url, published.id))
                .query(&[("fields", "permalink"), ("access_token", token)])
                .send()
                .await,
        )
        .await?;

        let permalink = info
            .permalink
            .unwrap_or_else(|| format!("https://www.instagram.com/reel/{}", published.id));

        info!(media_id = %published.id, %permalink, "instagram reel published");
        Ok(PublishedMedia {
            id: published.id,
            permalink,
        })
    }
}
