//! The two periodic scans run by [`PublishScheduler`](crate::kernel::PublishScheduler).
//!
//! Both scans claim before acting, so overlapping runs (or several server
//! instances) publish a post or fire a calendar at most once.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::domains::scheduling::models::{PublishingCalendar, ScheduledPost, ScheduledPostStatus};
use crate::domains::scheduling::recurrence::next_scheduled_at;
use crate::domains::series::activities::{generate_next_video, pick_topic};
use crate::domains::videos::activities::{create_video, publish_and_record, NewVideo};
use crate::domains::videos::{FollowUp, GenerateContentJob};
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DueScanSummary {
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
}

/// Publish every pending post due at `now`.
///
/// A post lost to a concurrent claim is skipped. Failures of one post are
/// recorded on it and never stop the scan.
pub async fn process_due_posts(deps: &ServerDeps, now: DateTime<Utc>) -> Result<DueScanSummary> {
    let due = deps.store.due_posts(now).await?;
    let mut summary = DueScanSummary::default();

    for candidate in due {
        let Some(post) = deps.store.claim_post(candidate.id, now).await? else {
            continue;
        };
        summary.claimed += 1;

        match publish_post(deps, post).await {
            Ok(post) if post.status == ScheduledPostStatus::Published => summary.published += 1,
            Ok(_) => summary.failed += 1,
            Err(e) => {
                error!(post_id = %candidate.id, error = %format!("{:#}", e), "failed to record scheduled post outcome");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

async fn publish_post(deps: &ServerDeps, mut post: ScheduledPost) -> Result<ScheduledPost> {
    let outcome = match deps.store.find_video(post.video_id).await? {
        None => Err(format!("video {} not found", post.video_id)),
        Some(video) => match publish_and_record(video, &post.platforms, deps).await {
            Ok((_, report)) if report.any_succeeded() => Ok(report),
            Ok((_, report)) => Err(report
                .failure_summary()
                .unwrap_or_else(|| "publish failed on every platform".to_string())),
            Err(e) => Err(format!("{:#}", e)),
        },
    };

    match outcome {
        Ok(report) => {
            post.status = ScheduledPostStatus::Published;
            post.published_urls = report.published_links();
            // Partial failures stay visible next to the links.
            post.error = report.failure_summary();
            info!(post_id = %post.id, video_id = %post.video_id, "scheduled post published");
        }
        Err(message) => {
            post.status = ScheduledPostStatus::Failed;
            post.error = Some(message);
            warn!(
                post_id = %post.id,
                video_id = %post.video_id,
                error = post.error.as_deref().unwrap_or_default(),
                "scheduled post failed"
            );
        }
    }

    post.updated_at = Utc::now();
    deps.store.save_post_outcome(&post).await?;
    Ok(post)
}

/// Fire every active calendar due at `now`. Returns how many fired.
pub async fn process_due_calendars(deps: &ServerDeps, now: DateTime<Utc>) -> Result<usize> {
    let due = deps.store.due_calendars(now).await?;
    let mut fired = 0;

    for calendar in due {
        let next = match next_scheduled_at(calendar.frequency, &calendar.time_slots, now) {
            Ok(next) => next,
            Err(e) => {
                error!(calendar_id = %calendar.id, error = %e, "cannot compute next fire time");
                continue;
            }
        };

        if !deps
            .store
            .advance_calendar(calendar.id, calendar.next_scheduled_at, next)
            .await?
        {
            continue;
        }

        match fire_calendar(deps, &calendar).await {
            Ok(()) => fired += 1,
            Err(e) => error!(
                calendar_id = %calendar.id,
                error = %format!("{:#}", e),
                "calendar trigger failed"
            ),
        }
    }

    Ok(fired)
}

/// Start the next video for `calendar`, to be published at the instant it fired.
async fn fire_calendar(deps: &ServerDeps, calendar: &PublishingCalendar) -> Result<()> {
    let follow_up = FollowUp {
        scheduled_at: calendar.next_scheduled_at,
        platforms: calendar.platforms.clone(),
    };

    let (video_id, job_id) = match calendar.series_id {
        Some(series_id) => {
            let (video, job_id) = generate_next_video(deps, series_id, Some(follow_up)).await?;
            (video.id, job_id)
        }
        None => {
            let title = pick_topic(deps, None).await;
            let video = create_video(
                deps,
                NewVideo {
                    owner_id: calendar.owner_id,
                    title,
                    series_id: None,
                    script: None,
                },
            )
            .await?;
            let job_id = deps
                .job_queue
                .enqueue(GenerateContentJob::new(video.id).with_follow_up(follow_up))
                .await?;
            (video.id, job_id)
        }
    };

    info!(
        calendar_id = %calendar.id,
        video_id = %video_id,
        job_id = %job_id,
        "calendar fired"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CalendarId, OwnerId, Platform, ScheduledPostId, SeriesId, VideoId};
    use crate::domains::scheduling::models::{PostUpdate, TimeSlot};
    use crate::domains::series::models::Series;
    use crate::domains::videos::{Video, VideoStatus};
    use crate::kernel::test_dependencies::{MockFailure, MockPlatformClient, PlatformBehavior};
    use crate::kernel::{MemoryStore, PipelineStore, TestDependencies};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    async fn scheduled_video(test_deps: &TestDependencies) -> Video {
        let mut video = Video::draft(OwnerId::new(), "Octopus facts");
        video.script = "Octopuses have three hearts.".into();
        video.video_url = Some("https://cdn.test/video-1.mp4".into());
        video.status = VideoStatus::Scheduled;
        test_deps.store.insert_video(&video).await.unwrap();
        video
    }

    #[tokio::test]
    async fn due_post_is_published_once() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let video = scheduled_video(&test_deps).await;
        let now = Utc::now();
        let post = ScheduledPost::new(
            video.owner_id,
            video.id,
            vec![Platform::Youtube, Platform::Instagram],
            now - Duration::minutes(1),
        );
        test_deps.store.insert_post(&post).await.unwrap();

        let first = process_due_posts(&deps, now).await.unwrap();
        let second = process_due_posts(&deps, now).await.unwrap();

        assert_eq!(first, DueScanSummary { claimed: 1, published: 1, failed: 0 });
        assert_eq!(second.claimed, 0);

        let stored = test_deps.store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduledPostStatus::Published);
        assert_eq!(stored.published_urls.len(), 2);

        let video = test_deps.store.find_video(video.id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Published);
        assert_eq!(
            test_deps.platform(Platform::Youtube).unwrap().publish_count(),
            1
        );
    }

    #[tokio::test]
    async fn future_posts_are_left_alone() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let video = scheduled_video(&test_deps).await;
        let now = Utc::now();
        let post = ScheduledPost::new(
            video.owner_id,
            video.id,
            vec![Platform::Youtube],
            now + Duration::hours(1),
        );
        test_deps.store.insert_post(&post).await.unwrap();

        let summary = process_due_posts(&deps, now).await.unwrap();

        assert_eq!(summary.claimed, 0);
        let stored = test_deps.store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduledPostStatus::Pending);
    }

    #[tokio::test]
    async fn post_fails_when_every_platform_fails() {
        let test_deps = TestDependencies::new().mock_platform(MockPlatformClient::new(
            Platform::Youtube,
            PlatformBehavior::FailSubmit(MockFailure::configuration("no token")),
        ));
        let deps = test_deps.deps();
        let video = scheduled_video(&test_deps).await;
        let now = Utc::now();
        let post = ScheduledPost::new(video.owner_id, video.id, vec![Platform::Youtube], now);
        test_deps.store.insert_post(&post).await.unwrap();

        let summary = process_due_posts(&deps, now).await.unwrap();

        assert_eq!(summary.failed, 1);
        let stored = test_deps.store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduledPostStatus::Failed);
        assert!(stored.error.unwrap().contains("no token"));
    }

    /// Deletes a post's video right after the post is claimed.
    struct VideoDeletedAfterClaim(Arc<MemoryStore>);

    #[async_trait]
    impl PipelineStore for VideoDeletedAfterClaim {
        async fn insert_video(&self, video: &Video) -> Result<()> {
            self.0.insert_video(video).await
        }
        async fn find_video(&self, id: VideoId) -> Result<Option<Video>> {
            self.0.find_video(id).await
        }
        async fn save_video(&self, video: &Video) -> Result<()> {
            self.0.save_video(video).await
        }
        async fn delete_video(&self, id: VideoId) -> Result<bool> {
            self.0.delete_video(id).await
        }
        async fn videos_for_series(&self, series_id: SeriesId) -> Result<Vec<Video>> {
            self.0.videos_for_series(series_id).await
        }
        async fn insert_series(&self, series: &Series) -> Result<()> {
            self.0.insert_series(series).await
        }
        async fn find_series(&self, id: SeriesId) -> Result<Option<Series>> {
            self.0.find_series(id).await
        }
        async fn delete_series(&self, id: SeriesId) -> Result<bool> {
            self.0.delete_series(id).await
        }
        async fn insert_post(&self, post: &ScheduledPost) -> Result<()> {
            self.0.insert_post(post).await
        }
        async fn find_post(&self, id: ScheduledPostId) -> Result<Option<ScheduledPost>> {
            self.0.find_post(id).await
        }
        async fn posts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<ScheduledPost>> {
            self.0.posts_for_owner(owner_id).await
        }
        async fn posts_for_video(&self, video_id: VideoId) -> Result<Vec<ScheduledPost>> {
            self.0.posts_for_video(video_id).await
        }
        async fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
            self.0.due_posts(now).await
        }
        async fn claim_post(
            &self,
            id: ScheduledPostId,
            now: DateTime<Utc>,
        ) -> Result<Option<ScheduledPost>> {
            let claimed = self.0.claim_post(id, now).await?;
            if let Some(post) = &claimed {
                self.0.delete_video(post.video_id).await?;
            }
            Ok(claimed)
        }
        async fn update_pending_post(
            &self,
            id: ScheduledPostId,
            update: &PostUpdate,
        ) -> Result<Option<ScheduledPost>> {
            self.0.update_pending_post(id, update).await
        }
        async fn cancel_post(&self, id: ScheduledPostId) -> Result<bool> {
            self.0.cancel_post(id).await
        }
        async fn save_post_outcome(&self, post: &ScheduledPost) -> Result<()> {
            self.0.save_post_outcome(post).await
        }
        async fn insert_calendar(&self, calendar: &PublishingCalendar) -> Result<()> {
            self.0.insert_calendar(calendar).await
        }
        async fn find_calendar(&self, id: CalendarId) -> Result<Option<PublishingCalendar>> {
            self.0.find_calendar(id).await
        }
        async fn calendars_for_owner(&self, owner_id: OwnerId) -> Result<Vec<PublishingCalendar>> {
            self.0.calendars_for_owner(owner_id).await
        }
        async fn save_calendar(&self, calendar: &PublishingCalendar) -> Result<()> {
            self.0.save_calendar(calendar).await
        }
        async fn delete_calendar(&self, id: CalendarId) -> Result<bool> {
            self.0.delete_calendar(id).await
        }
        async fn due_calendars(&self, now: DateTime<Utc>) -> Result<Vec<PublishingCalendar>> {
            self.0.due_calendars(now).await
        }
        async fn advance_calendar(
            &self,
            id: CalendarId,
            expected: DateTime<Utc>,
            next: DateTime<Utc>,
        ) -> Result<bool> {
            self.0.advance_calendar(id, expected, next).await
        }
    }

    #[tokio::test]
    async fn video_deleted_mid_scan_fails_the_post() {
        let test_deps = TestDependencies::new();
        let store: Arc<dyn PipelineStore> =
            Arc::new(VideoDeletedAfterClaim(test_deps.store.clone()));
        let mut deps = (*test_deps.deps()).clone();
        deps.store = store;

        let video = scheduled_video(&test_deps).await;
        let now = Utc::now();
        let post = ScheduledPost::new(video.owner_id, video.id, vec![Platform::Youtube], now);
        test_deps.store.insert_post(&post).await.unwrap();
        let other = scheduled_video(&test_deps).await;
        let other_post =
            ScheduledPost::new(other.owner_id, other.id, vec![Platform::Youtube], now);
        test_deps.store.insert_post(&other_post).await.unwrap();

        let summary = process_due_posts(&deps, now).await.unwrap();

        // Both videos vanish after their claims; the scan still visits each post.
        assert_eq!(summary, DueScanSummary { claimed: 2, published: 0, failed: 2 });
        assert_eq!(
            test_deps.platform(Platform::Youtube).unwrap().publish_count(),
            0
        );
        assert!(test_deps.store.find_post(post.id).await.unwrap().is_none());
        assert!(test_deps.store.find_video(video.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn due_calendar_fires_once_and_advances() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let fire_at = Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap();
        let now = fire_at + Duration::minutes(5);
        let calendar = PublishingCalendar {
            id: crate::common::CalendarId::new(),
            owner_id: OwnerId::new(),
            series_id: None,
            frequency: crate::common::Frequency::Weekly,
            time_slots: vec![TimeSlot::new(3, 10, 0)],
            platforms: vec![Platform::Instagram],
            active: true,
            next_scheduled_at: fire_at,
            created_at: fire_at,
            updated_at: fire_at,
        };
        test_deps.store.insert_calendar(&calendar).await.unwrap();

        assert_eq!(process_due_calendars(&deps, now).await.unwrap(), 1);
        assert_eq!(process_due_calendars(&deps, now).await.unwrap(), 0);

        let stored = test_deps.store.find_calendar(calendar.id).await.unwrap().unwrap();
        assert_eq!(
            stored.next_scheduled_at,
            Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap()
        );
        assert_eq!(
            test_deps
                .job_queue
                .jobs_of_type(crate::kernel::jobs::JobType::GenerateContent)
                .len(),
            1
        );
    }
}
