use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::PipelineStore;
use crate::common::{CalendarId, OwnerId, ScheduledPostId, SeriesId, VideoId};
use crate::domains::scheduling::models::{PostUpdate, PublishingCalendar, ScheduledPost};
use crate::domains::series::models::Series;
use crate::domains::videos::models::Video;

/// [`PipelineStore`] backed by the model SQL.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PipelineStore for PostgresStore {
    async fn insert_video(&self, video: &Video) -> Result<()> {
        video.insert(&self.pool).await
    }

    async fn find_video(&self, id: VideoId) -> Result<Option<Video>> {
        Video::find_by_id(id, &self.pool).await
    }

    async fn save_video(&self, video: &Video) -> Result<()> {
        video.update(&self.pool).await
    }

    async fn delete_video(&self, id: VideoId) -> Result<bool> {
        Video::delete(id, &self.pool).await
    }

    async fn videos_for_series(&self, series_id: SeriesId) -> Result<Vec<Video>> {
        Video::find_by_series(series_id, &self.pool).await
    }

    async fn insert_series(&self, series: &Series) -> Result<()> {
        series.insert(&self.pool).await
    }

    async fn find_series(&self, id: SeriesId) -> Result<Option<Series>> {
        Series::find_by_id(id, &self.pool).await
    }

    async fn delete_series(&self, id: SeriesId) -> Result<bool> {
        Series::delete(id, &self.pool).await
    }

    async fn insert_post(&self, post: &ScheduledPost) -> Result<()> {
        post.insert(&self.pool).await
    }

    async fn find_post(&self, id: ScheduledPostId) -> Result<Option<ScheduledPost>> {
        ScheduledPost::find_by_id(id, &self.pool).await
    }

    async fn posts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<ScheduledPost>> {
        ScheduledPost::find_by_owner(owner_id, &self.pool).await
    }

    async fn posts_for_video(&self, video_id: VideoId) -> Result<Vec<ScheduledPost>> {
        ScheduledPost::find_by_video(video_id, &self.pool).await
    }

    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        ScheduledPost::find_due(now, &self.pool).await
    }

    async fn claim_post(
        &self,
        id: ScheduledPostId,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledPost>> {
        ScheduledPost::claim(id, now, &self.pool).await
    }

    async fn update_pending_post(
        &self,
        id: ScheduledPostId,
        update: &PostUpdate,
    ) -> Result<Option<ScheduledPost>> {
        ScheduledPost::update_pending(id, update, &self.pool).await
    }

    async fn cancel_post(&self, id: ScheduledPostId) -> Result<bool> {
        ScheduledPost::delete_pending(id, &self.pool).await
    }

    async fn save_post_outcome(&self, post: &ScheduledPost) -> Result<()> {
        post.save_outcome(&self.pool).await
    }

    async fn insert_calendar(&self, calendar: &PublishingCalendar) -> Result<()> {
        calendar.insert(&self.pool).await
    }

    async fn find_calendar(&self, id: CalendarId) -> Result<Option<PublishingCalendar>> {
        PublishingCalendar::find_by_id(id, &self.pool).await
    }

    async fn calendars_for_owner(&self, owner_id: OwnerId) -> Result<Vec<PublishingCalendar>> {
        PublishingCalendar::find_by_owner(owner_id, &self.pool).await
    }

    async fn save_calendar(&self, calendar: &PublishingCalendar) -> Result<()> {
        calendar.update(&self.pool).await
    }

    async fn delete_calendar(&self, id: CalendarId) -> Result<bool> {
        PublishingCalendar::delete(id, &self.pool).await
    }

    async fn due_calendars(&self, now: DateTime<Utc>) -> Result<Vec<PublishingCalendar>> {
        PublishingCalendar::find_due(now, &self.pool).await
    }

    async fn advance_calendar(
        &self,
        id: CalendarId,
        expected: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> Result<bool> {
        PublishingCalendar::advance(id, expected, next, &self.pool).await
    }
}
