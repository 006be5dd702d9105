use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::common::{OwnerId, Platform, ScheduledPostId, VideoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "scheduled_post_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduledPostStatus {
    #[default]
    Pending,
    Processing,
    Published,
    Failed,
}

/// A one-shot request to publish a video to some platforms at a given instant.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduledPost {
    pub id: ScheduledPostId,
    pub owner_id: OwnerId,
    pub video_id: VideoId,
    #[sqlx(json)]
    pub platforms: Vec<Platform>,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduledPostStatus,
    #[sqlx(json)]
    pub published_urls: BTreeMap<Platform, String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Edits allowed on a pending post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub platforms: Option<Vec<Platform>>,
}

impl PostUpdate {
    pub fn apply_to(&self, post: &mut ScheduledPost) {
        if let Some(at) = self.scheduled_at {
            post.scheduled_at = at;
        }
        if let Some(platforms) = &self.platforms {
            post.platforms = platforms.clone();
        }
        post.updated_at = Utc::now();
    }
}

impl ScheduledPost {
    pub fn new(
        owner_id: OwnerId,
        video_id: VideoId,
        platforms: Vec<Platform>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ScheduledPostId::new(),
            owner_id,
            video_id,
            platforms,
            scheduled_at,
            status: ScheduledPostStatus::Pending,
            published_urls: BTreeMap::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduledPostStatus::Pending && self.scheduled_at <= now
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_posts (id, owner_id, video_id, platforms, scheduled_at, status,
                                         published_urls, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(self.id)
        .bind(self.owner_id)
        .bind(self.video_id)
        .bind(Json(&self.platforms))
        .bind(self.scheduled_at)
        .bind(self.status)
        .bind(Json(&self.published_urls))
        .bind(&self.error)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await
        .context("failed to insert scheduled post")?;

        Ok(())
    }

    pub async fn find_by_id(id: ScheduledPostId, pool: &PgPool) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Self>("SELECT * FROM scheduled_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(post)
    }

    pub async fn find_by_owner(owner_id: OwnerId, pool: &PgPool) -> Result<Vec<Self>> {
        let posts = sqlx::query_as::<_, Self>(
            "SELECT * FROM scheduled_posts WHERE owner_id = $1 ORDER BY scheduled_at ASC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(posts)
    }

    pub async fn find_by_video(video_id: VideoId, pool: &PgPool) -> Result<Vec<Self>> {
        let posts = sqlx::query_as::<_, Self>(
            "SELECT * FROM scheduled_posts WHERE video_id = $1 ORDER BY scheduled_at ASC",
        )
        .bind(video_id)
        .fetch_all(pool)
        .await?;

        Ok(posts)
    }

    /// Pending posts whose time has come, oldest first.
    pub async fn find_due(now: DateTime<Utc>, pool: &PgPool) -> Result<Vec<Self>> {
        let posts = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM scheduled_posts
            WHERE status = 'pending' AND scheduled_at <= $1
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(posts)
    }

    /// Conditionally move `pending → processing`. Only one caller can win.
    pub async fn claim(
        id: ScheduledPostId,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Self>(
            r#"
            UPDATE scheduled_posts
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND scheduled_at <= $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// Apply `update` if the post is still pending.
    pub async fn update_pending(
        id: ScheduledPostId,
        update: &PostUpdate,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let post = sqlx::query_as::<_, Self>(
            r#"
            UPDATE scheduled_posts
            SET scheduled_at = COALESCE($2, scheduled_at),
                platforms = COALESCE($3, platforms),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.scheduled_at)
        .bind(update.platforms.as_ref().map(Json))
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// Delete the post if it is still pending.
    pub async fn delete_pending(id: ScheduledPostId, pool: &PgPool) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM scheduled_posts WHERE id = $1 AND status = 'pending'")
                .bind(id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist the outcome of a processed post.
    pub async fn save_outcome(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = $2,
                published_urls = $3,
                error = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.status)
        .bind(Json(&self.published_urls))
        .bind(&self.error)
        .execute(pool)
        .await?;

        Ok(())
    }
}
