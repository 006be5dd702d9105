use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PipelineStore;
use crate::common::{CalendarId, OwnerId, ScheduledPostId, SeriesId, VideoId};
use crate::domains::scheduling::models::{
    PostUpdate, PublishingCalendar, ScheduledPost, ScheduledPostStatus,
};
use crate::domains::series::models::Series;
use crate::domains::videos::models::Video;

#[derive(Default)]
struct Tables {
    videos: HashMap<VideoId, Video>,
    series: HashMap<SeriesId, Series>,
    posts: HashMap<ScheduledPostId, ScheduledPost>,
    calendars: HashMap<CalendarId, PublishingCalendar>,
}

impl Tables {
    fn remove_video(&mut self, id: VideoId) -> bool {
        self.posts.retain(|_, p| p.video_id != id);
        self.videos.remove(&id).is_some()
    }
}

/// In-process [`PipelineStore`] with the same cascade and conditional-update
/// rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        f(&tables)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        f(&mut tables)
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn insert_video(&self, video: &Video) -> Result<()> {
        self.write(|t| {
            t.videos.insert(video.id, video.clone());
        });
        Ok(())
    }

    async fn find_video(&self, id: VideoId) -> Result<Option<Video>> {
        Ok(self.read(|t| t.videos.get(&id).cloned()))
    }

    async fn save_video(&self, video: &Video) -> Result<()> {
        self.write(|t| {
            let stored = t
                .videos
                .get_mut(&video.id)
                .with_context(|| format!("failed to update video {}", video.id))?;
            *stored = video.clone();
            stored.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete_video(&self, id: VideoId) -> Result<bool> {
        Ok(self.write(|t| t.remove_video(id)))
    }

    async fn videos_for_series(&self, series_id: SeriesId) -> Result<Vec<Video>> {
        Ok(self.read(|t| {
            let mut videos: Vec<Video> = t
                .videos
                .values()
                .filter(|v| v.series_id == Some(series_id))
                .cloned()
                .collect();
            videos.sort_by_key(|v| (v.created_at, v.id));
            videos
        }))
    }

    async fn insert_series(&self, series: &Series) -> Result<()> {
        self.write(|t| {
            t.series.insert(series.id, series.clone());
        });
        Ok(())
    }

    async fn find_series(&self, id: SeriesId) -> Result<Option<Series>> {
        Ok(self.read(|t| t.series.get(&id).cloned()))
    }

    async fn delete_series(&self, id: SeriesId) -> Result<bool> {
        Ok(self.write(|t| {
            let video_ids: Vec<VideoId> = t
                .videos
                .values()
                .filter(|v| v.series_id == Some(id))
                .map(|v| v.id)
                .collect();
            for video_id in video_ids {
                t.remove_video(video_id);
            }
            for calendar in t.calendars.values_mut() {
                if calendar.series_id == Some(id) {
                    calendar.series_id = None;
                }
            }
            t.series.remove(&id).is_some()
        }))
    }

    async fn insert_post(&self, post: &ScheduledPost) -> Result<()> {
        self.write(|t| {
            anyhow::ensure!(
                t.videos.contains_key(&post.video_id),
                "failed to insert scheduled post: video {} does not exist",
                post.video_id
            );
            t.posts.insert(post.id, post.clone());
            Ok(())
        })
    }

    async fn find_post(&self, id: ScheduledPostId) -> Result<Option<ScheduledPost>> {
        Ok(self.read(|t| t.posts.get(&id).cloned()))
    }

    async fn posts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<ScheduledPost>> {
        Ok(self.read(|t| {
            let mut posts: Vec<ScheduledPost> = t
                .posts
                .values()
                .filter(|p| p.owner_id == owner_id)
                .cloned()
                .collect();
            posts.sort_by_key(|p| (p.scheduled_at, p.id));
            posts
        }))
    }

    async fn posts_for_video(&self, video_id: VideoId) -> Result<Vec<ScheduledPost>> {
        Ok(self.read(|t| {
            let mut posts: Vec<ScheduledPost> = t
                .posts
                .values()
                .filter(|p| p.video_id == video_id)
                .cloned()
                .collect();
            posts.sort_by_key(|p| (p.scheduled_at, p.id));
            posts
        }))
    }

    async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        Ok(self.read(|t| {
            let mut posts: Vec<ScheduledPost> =
                t.posts.values().filter(|p| p.is_due(now)).cloned().collect();
            posts.sort_by_key(|p| (p.scheduled_at, p.id));
            posts
        }))
    }

    async fn claim_post(
        &self,
        id: ScheduledPostId,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledPost>> {
        Ok(self.write(|t| {
            let post = t.posts.get_mut(&id).filter(|p| p.is_due(now))?;
            post.status = ScheduledPostStatus::Processing;
            post.updated_at = Utc::now();
            Some(post.clone())
        }))
    }

    async fn update_pending_post(
        &self,
        id: ScheduledPostId,
        update: &PostUpdate,
    ) -> Result<Option<ScheduledPost>> {
        Ok(self.write(|t| {
            let post = t
                .posts
                .get_mut(&id)
                .filter(|p| p.status == ScheduledPostStatus::Pending)?;
            update.apply_to(post);
            Some(post.clone())
        }))
    }

    async fn cancel_post(&self, id: ScheduledPostId) -> Result<bool> {
        Ok(self.write(|t| {
            let pending = t
                .posts
                .get(&id)
                .is_some_and(|p| p.status == ScheduledPostStatus::Pending);
            if pending {
                t.posts.remove(&id);
            }
            pending
        }))
    }

    async fn save_post_outcome(&self, post: &ScheduledPost) -> Result<()> {
        // A post removed with its video has nothing left to record.
        self.write(|t| {
            if let Some(stored) = t.posts.get_mut(&post.id) {
                stored.status = post.status;
                stored.published_urls = post.published_urls.clone();
                stored.error = post.error.clone();
                stored.updated_at = Utc::now();
            }
        });
        Ok(())
    }

    async fn insert_calendar(&self, calendar: &PublishingCalendar) -> Result<()> {
        self.write(|t| {
            t.calendars.insert(calendar.id, calendar.clone());
        });
        Ok(())
    }

    async fn find_calendar(&self, id: CalendarId) -> Result<Option<PublishingCalendar>> {
        Ok(self.read(|t| t.calendars.get(&id).cloned()))
    }

    async fn calendars_for_owner(&self, owner_id: OwnerId) -> Result<Vec<PublishingCalendar>> {
        Ok(self.read(|t| {
            let mut calendars: Vec<PublishingCalendar> = t
                .calendars
                .values()
                .filter(|c| c.owner_id == owner_id)
                .cloned()
                .collect();
            calendars.sort_by_key(|c| (c.created_at, c.id));
            calendars
        }))
    }

    async fn save_calendar(&self, calendar: &PublishingCalendar) -> Result<()> {
        self.write(|t| {
            let stored = t
                .calendars
                .get_mut(&calendar.id)
                .with_context(|| format!("failed to update calendar {}", calendar.id))?;
            *stored = calendar.clone();
            stored.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete_calendar(&self, id: CalendarId) -> Result<bool> {
        Ok(self.write(|t| t.calendars.remove(&id).is_some()))
    }

    async fn due_calendars(&self, now: DateTime<Utc>) -> Result<Vec<PublishingCalendar>> {
        Ok(self.read(|t| {
            let mut calendars: Vec<PublishingCalendar> = t
                .calendars
                .values()
                .filter(|c| c.is_due(now))
                .cloned()
                .collect();
            calendars.sort_by_key(|c| (c.next_scheduled_at, c.id));
            calendars
        }))
    }

    async fn advance_calendar(
        &self,
        id: CalendarId,
        expected: DateTime<Utc>,
        next: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.write(|t| match t.calendars.get_mut(&id) {
            Some(calendar) if calendar.next_scheduled_at == expected => {
                calendar.next_scheduled_at = next;
                calendar.updated_at = Utc::now();
                true
            }
            _ => false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Frequency, Platform};

    #[tokio::test]
    async fn deleting_a_series_cascades_to_videos_and_posts() {
        let store = MemoryStore::new();
        let owner = OwnerId::new();
        let series = Series::new(owner, "Space", None, Frequency::Weekly);
        store.insert_series(&series).await.unwrap();

        let video = Video::draft(owner, "Black holes").with_series(series.id);
        store.insert_video(&video).await.unwrap();
        let post = ScheduledPost::new(owner, video.id, vec![Platform::Youtube], Utc::now());
        store.insert_post(&post).await.unwrap();

        assert!(store.delete_series(series.id).await.unwrap());
        assert!(store.find_video(video.id).await.unwrap().is_none());
        assert!(store.find_post(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_post_is_at_most_once() {
        let store = MemoryStore::new();
        let owner = OwnerId::new();
        let video = Video::draft(owner, "Claim me");
        store.insert_video(&video).await.unwrap();
        let post = ScheduledPost::new(owner, video.id, vec![Platform::Youtube], Utc::now());
        store.insert_post(&post).await.unwrap();

        let now = Utc::now();
        assert!(store.claim_post(post.id, now).await.unwrap().is_some());
        assert!(store.claim_post(post.id, now).await.unwrap().is_none());
        assert!(!store.cancel_post(post.id).await.unwrap());
    }

    #[tokio::test]
    async fn advance_calendar_is_compare_and_set() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let calendar = PublishingCalendar {
            id: CalendarId::new(),
            owner_id: OwnerId::new(),
            series_id: None,
            frequency: Frequency::Daily,
            time_slots: vec![],
            platforms: vec![],
            active: true,
            next_scheduled_at: now,
            created_at: now,
            updated_at: now,
        };
        store.insert_calendar(&calendar).await.unwrap();

        let next = now + chrono::Duration::days(1);
        assert!(store.advance_calendar(calendar.id, now, next).await.unwrap());
        assert!(!store.advance_calendar(calendar.id, now, next).await.unwrap());
    }
}
