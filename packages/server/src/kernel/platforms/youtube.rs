use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{MediaStatus, PlatformClient, PublishableMedia, PublishedMedia};
use crate::common::{PipelineError, Platform};
use crate::kernel::http;

const API_URL: &str = "https://www.googleapis.com/youtube/v3";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3";
const PROVIDER: &str = "youtube";

/// YouTube Data API client.
///
/// Videos are uploaded as private, polled until processing succeeds and then
/// switched to public on publish.
pub struct YouTubeClient {
    client: reqwest::Client,
    api_url: String,
    upload_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    #[serde(default)]
    processing_details: Option<ProcessingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingDetails {
    processing_status: String,
    #[serde(default)]
    processing_failure_reason: Option<String>,
}

impl YouTubeClient {
    pub fn new(access_token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client(Duration::from_secs(300))?,
            api_url: API_URL.to_string(),
            upload_url: UPLOAD_URL.to_string(),
            access_token,
        })
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| PipelineError::configuration("YouTube API credentials not configured").into())
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

/// Description with the hashtags appended on their own line.
fn description_with_tags(media: &PublishableMedia) -> String {
    if media.hashtags.is_empty() {
        return media.description.clone();
    }
    let tags: Vec<String> = media
        .hashtags
        .iter()
        .map(|t| format!("#{}", t.trim_start_matches('#')))
        .collect();
    format!("{}\n\n{}", media.description, tags.join(" "))
}

fn parse_processing(list: VideoListResponse, video_id: &str) -> Result<MediaStatus> {
    let resource = list
        .items
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::not_found("youtube video", video_id))?;

    let Some(details) = resource.processing_details else {
        return Ok(MediaStatus::InProgress);
    };

    Ok(match details.processing_status.as_str() {
        "succeeded" => MediaStatus::Finished,
        "failed" | "terminated" => MediaStatus::Error(
            details
                .processing_failure_reason
                .unwrap_or(details.processing_status),
        ),
        _ => MediaStatus::InProgress,
    })
}

#[async_trait]
impl PlatformClient for YouTubeClient {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn submit_media(&self, media: &PublishableMedia) -> Result<String> {
        let token = self.token()?;

        let video = http::checked(PROVIDER, self.client.get(&media.video_url).send().await)
            .await?
            .bytes()
            .await
            .map_err(|e| PipelineError::from_transport(PROVIDER, e))?;

        let metadata = json!({
            "snippet": {
                "title": media.title,
                "description": description_with_tags(media),
                "tags": media.hashtags,
            },
            "status": { "privacyStatus": "private" },
        });

        let session = http::checked(
            PROVIDER,
            self.client
                .post(format!("{}/videos", self.upload_url))
                .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                .bearer_auth(token)
                .header("X-Upload-Content-Type", "video/*")
                .header("X-Upload-Content-Length", video.len())
                .json(&metadata)
                .send()
                .await,
        )
        .await?;

        let location = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::data("YouTube upload session has no Location header"))?;

        let uploaded: IdResponse = http::json(
            PROVIDER,
            self.client
                .put(location)
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, "video/*")
                .body(video)
                .send()
                .await,
        )
        .await?;

        debug!(video_id = %uploaded.id, "youtube upload finished");
        Ok(uploaded.id)
    }

    async fn poll_status(&self, container_id: &str) -> Result<MediaStatus> {
        let token = self.token()?;

        let list: VideoListResponse = http::json(
            PROVIDER,
            self.client
                .get(format!("{}/videos", self.api_url))
                .query(&[("part", "processingDetails"), ("id", container_id)])
                .bearer_auth(token)
                .send()
                .await,
        )
        .await?;

        parse_processing(list, container_id)
    }

    async fn publish(&self, container_id: &str) -> Result<PublishedMedia> {
        let token = self.token()?;

        http::checked(
            PROVIDER,
            self.client
                .put(format!("{}/videos", self.api_url))
                .query(&[("part", "status")])
                .bearer_auth(token)
                .json(&json!({
                    "id": container_id,
                    "status": { "privacyStatus": "public" },
                }))
                .send()
                .await,
        )
        .await?;

        let permalink = Self::watch_url(container_id);
        info!(video_id = %container_id, %permalink, "youtube video made public");
        Ok(PublishedMedia {
            id: container_id.to_string(),
            permalink,
        })
    }
}
