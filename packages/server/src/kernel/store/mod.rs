//! Entity state store.
//!
//! Processors, the scheduler and the HTTP layer read and write videos, series,
//! scheduled posts and calendars through [`PipelineStore`]. Writes are whole
//! entity replacements (last writer wins). The two conditional operations,
//! [`PipelineStore::claim_post`] and [`PipelineStore::advance_calendar`], are
//! the at-most-once guards used by the scheduler.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{CalendarId, OwnerId, ScheduledPostId, SeriesId, VideoId};
use crate::domains::scheduling::models::{PostUpdate, PublishingCalendar, ScheduledPost};
use crate::domains::series::models::Series;
use crate::domains::videos::models::Video;

#[async_trait]
pub trait PipelineStore: Send + Sync {
    // Videos
    async fn insert_video(&self, video: &Video) -> Result<()>;
    async fn find_video(&self, id: VideoId) -> Result<Option<Video>>;
    async fn save_video(&self, video: &Video) -> Result<()>;
    /// Deletes the video and its scheduled posts.
    async fn delete_video(&self, id: VideoId) -> Result<bool>;
    async fn videos_for_series(&self, series_id: SeriesId) -> Result<Vec<Video>>;

    // Series
    async fn insert_series(&self, series: &Series) -> Result<()>;
    async fn find_series(&self, id: SeriesId) -> Result<Option<Series>>;
    /// Deletes the series, its videos and their scheduled posts.
    async fn delete_series(&self, id: SeriesId) -> Result<bool>;

    // Scheduled posts
    async fn insert_post(&self, post: &ScheduledPost) -> Result<()>;
    async fn find_post(&self, id: ScheduledPostId) -> Result<Option<ScheduledPost>>;
    async fn posts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<ScheduledPost>>;
    async fn posts_for_video(&self, video_id: VideoId) -> Result<Vec<ScheduledPost>>;
    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>>;
    /// `pending → processing` if still pending and due. `None` when lost.
    async fn claim_post(
        &self,
        id: ScheduledPostId,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledPost>>;
    /// `None` when the post is missing or no longer pending.
    async fn update_pending_post(
        &self,
        id: ScheduledPostId,
        update: &PostUpdate,
    ) -> Result<Option<ScheduledPost>>;
    /// Removes a pending post. False when missing or already processed.
    async fn cancel_post(&self, id: ScheduledPostId) -> Result<bool>;
    /// Persist status, URLs and error of a processed post.
    async fn save_post_outcome(&self, post: &ScheduledPost) -> Result<()>;

    // Calendars
    async fn insert_calendar(&self, calendar: &PublishingCalendar) -> Result<()>;
    async fn find_calendar(&self, id: CalendarId) -> Result<Option<PublishingCalendar>>;
    async fn calendars_for_owner(&self, owner_id: OwnerId) -> Result<Vec<PublishingCalendar>>;
    async fn save_calendar(&self, calendar: &PublishingCalendar) -> Result<()>;
    async fn delete_calendar(&self, id: CalendarId) -> Result<bool>;
    async fn due_calendars(&self, now: DateTime<Utc>) -> Result<Vec<PublishingCalendar>>;
    /// Compare-and-set on `next_scheduled_at`. False when another scheduler won.
    async fn advance_calendar(
        &self,
        id: CalendarId,
        expected: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> Result<bool>;
}
