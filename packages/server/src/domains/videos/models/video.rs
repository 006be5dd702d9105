use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;

use super::status::{TransitionError, VideoStatus};
use crate::common::{
    Caption, ContentOptimization, OwnerId, Platform, PlatformOutcome, SeriesId, VideoId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Icon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Stock,
    Generated,
    Uploaded,
}

/// One visual asset, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub source: MediaSource,
}

impl MediaItem {
    pub fn generated_image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            source: MediaSource::Generated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    pub voice_id: String,
    pub text: String,
    pub audio_url: String,
}

/// A short-form video moving through the generation and publishing pipeline.
///
/// Generated fields (`script`, `media`, `narration`, `captions`, `hashtags`,
/// `thumbnail_url`, `video_url`) are written as soon as each step produces
/// them, so a retried job resumes where the previous attempt stopped.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: VideoId,
    pub owner_id: OwnerId,
    pub series_id: Option<SeriesId>,
    pub title: String,
    pub script: String,
    pub status: VideoStatus,
    #[sqlx(json)]
    pub media: Vec<MediaItem>,
    #[sqlx(json)]
    pub narration: Option<Narration>,
    #[sqlx(json)]
    pub captions: Vec<Caption>,
    #[sqlx(json)]
    pub hashtags: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    #[sqlx(json)]
    pub published_links: BTreeMap<Platform, String>,
    #[sqlx(json)]
    pub publish_results: BTreeMap<Platform, PlatformOutcome>,
    #[sqlx(json)]
    pub platform_optimizations: BTreeMap<Platform, ContentOptimization>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn draft(owner_id: OwnerId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            owner_id,
            series_id: None,
            title: title.into(),
            script: String::new(),
            status: VideoStatus::Draft,
            media: Vec::new(),
            narration: None,
            captions: Vec::new(),
            hashtags: Vec::new(),
            thumbnail_url: None,
            video_url: None,
            scheduled_at: None,
            published_at: None,
            published_links: BTreeMap::new(),
            publish_results: BTreeMap::new(),
            platform_optimizations: BTreeMap::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_series(mut self, series_id: SeriesId) -> Self {
        self.series_id = Some(series_id);
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    /// Move to `next`, enforcing the lifecycle edges.
    pub fn transition_to(&mut self, next: VideoStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                from: self.status,
                to: next,
            });
        }
        if next == VideoStatus::Completed && self.video_url.is_none() {
            return Err(TransitionError::MissingVideoUrl);
        }
        if next != VideoStatus::Failed {
            self.error_message = None;
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `failed` and keep the message for the user.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition_to(VideoStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Any output of the generation pipeline is present.
    pub fn has_generated_content(&self) -> bool {
        !self.script.trim().is_empty()
            || !self.media.is_empty()
            || self.narration.is_some()
            || !self.captions.is_empty()
            || !self.hashtags.is_empty()
            || self.thumbnail_url.is_some()
            || self.video_url.is_some()
    }

    /// Where a user-initiated retry of a failed video lands.
    pub fn retry_status(&self) -> VideoStatus {
        if self.has_generated_content() {
            VideoStatus::Processing
        } else {
            VideoStatus::Draft
        }
    }

    /// Total narration length implied by the captions, in seconds.
    pub fn narration_duration(&self) -> f64 {
        self.captions.last().map(|c| c.end_time).unwrap_or(0.0)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO videos (id, owner_id, series_id, title, script, status, media, narration,
                                captions, hashtags, thumbnail_url, video_url, scheduled_at,
                                published_at, published_links, publish_results,
                                platform_optimizations, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20)
            "#,
        )
        .bind(self.id)
        .bind(self.owner_id)
        .bind(self.series_id)
        .bind(&self.title)
        .bind(&self.script)
        .bind(self.status)
        .bind(Json(&self.media))
        .bind(Json(&self.narration))
        .bind(Json(&self.captions))
        .bind(Json(&self.hashtags))
        .bind(&self.thumbnail_url)
        .bind(&self.video_url)
        .bind(self.scheduled_at)
        .bind(self.published_at)
        .bind(Json(&self.published_links))
        .bind(Json(&self.publish_results))
        .bind(Json(&self.platform_optimizations))
        .bind(&self.error_message)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await
        .context("failed to insert video")?;

        Ok(())
    }

    pub async fn find_by_id(id: VideoId, pool: &PgPool) -> Result<Option<Self>> {
        let video = sqlx::query_as::<_, Self>("SELECT * FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(video)
    }

    pub async fn find_by_series(series_id: SeriesId, pool: &PgPool) -> Result<Vec<Self>> {
        let videos = sqlx::query_as::<_, Self>(
            "SELECT * FROM videos WHERE series_id = $1 ORDER BY created_at ASC",
        )
        .bind(series_id)
        .fetch_all(pool)
        .await?;

        Ok(videos)
    }

    /// Write every mutable column. Last writer wins.
    pub async fn update(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE videos
            SET title = $2,
                script = $3,
                status = $4,
                media = $5,
                narration = $6,
                captions = $7,
                hashtags = $8,
                thumbnail_url = $9,
                video_url = $10,
                scheduled_at = $11,
                published_at = $12,
                published_links = $13,
                publish_results = $14,
                platform_optimizations = $15,
                error_message = $16,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.script)
        .bind(self.status)
        .bind(Json(&self.media))
        .bind(Json(&self.narration))
        .bind(Json(&self.captions))
        .bind(Json(&self.hashtags))
        .bind(&self.thumbnail_url)
        .bind(&self.video_url)
        .bind(self.scheduled_at)
        .bind(self.published_at)
        .bind(Json(&self.published_links))
        .bind(Json(&self.publish_results))
        .bind(Json(&self.platform_optimizations))
        .bind(&self.error_message)
        .execute(pool)
        .await
        .with_context(|| format!("failed to update video {}", self.id))?;

        Ok(())
    }

    /// Delete a video. Its scheduled posts go with it (FK cascade).
    pub async fn delete(id: VideoId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
