use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::posts::{create_scheduled_post, NewScheduledPost};
use crate::common::{Frequency, OwnerId, Platform, VideoId};
use crate::domains::scheduling::models::{ScheduledPost, ScheduledPostStatus};
use crate::domains::scheduling::recurrence::spaced_instants;
use crate::kernel::ServerDeps;

/// One entry of a bulk schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPost {
    pub video_id: VideoId,
    pub scheduled_at: DateTime<Utc>,
    pub platforms: Vec<Platform>,
}

/// Spread `video_ids` over time, one per `frequency` step from `start`, in
/// the order given.
pub fn plan_bulk_schedule(
    video_ids: &[VideoId],
    platforms: &[Platform],
    start: DateTime<Utc>,
    frequency: Frequency,
) -> Vec<PlannedPost> {
    video_ids
        .iter()
        .zip(spaced_instants(start, frequency, video_ids.len()))
        .map(|(video_id, scheduled_at)| PlannedPost {
            video_id: *video_id,
            scheduled_at,
            platforms: platforms.to_vec(),
        })
        .collect()
}

/// Create every planned post in order, stopping at the first failure.
///
/// Posts already created stay; re-submitting the same plan returns them
/// instead of duplicating.
pub async fn schedule_bulk(
    deps: &ServerDeps,
    owner_id: OwnerId,
    plan: Vec<PlannedPost>,
) -> Result<Vec<ScheduledPost>> {
    let mut posts = Vec::with_capacity(plan.len());
    for planned in plan {
        let post = create_scheduled_post(
            deps,
            NewScheduledPost {
                owner_id,
                video_id: planned.video_id,
                platforms: planned.platforms,
                scheduled_at: planned.scheduled_at,
            },
        )
        .await?;
        posts.push(post);
    }

    info!(owner_id = %owner_id, count = posts.len(), "bulk schedule created");
    Ok(posts)
}

/// Per-owner counts over scheduled posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulingAnalytics {
    pub total: usize,
    pub pending: usize,
    pub published: usize,
    pub failed: usize,
    /// Pending posts still in the future.
    pub upcoming: usize,
    /// Posts targeting each platform.
    pub by_platform: BTreeMap<Platform, usize>,
}

impl SchedulingAnalytics {
    pub fn from_posts(posts: &[ScheduledPost], now: DateTime<Utc>) -> Self {
        let mut analytics = Self {
            total: posts.len(),
            ..Self::default()
        };

        for post in posts {
            match post.status {
                ScheduledPostStatus::Pending => {
                    analytics.pending += 1;
                    if post.scheduled_at > now {
                        analytics.upcoming += 1;
                    }
                }
                ScheduledPostStatus::Published => analytics.published += 1,
                ScheduledPostStatus::Failed => analytics.failed += 1,
                ScheduledPostStatus::Processing => {}
            }
            for platform in &post.platforms {
                *analytics.by_platform.entry(*platform).or_default() += 1;
            }
        }

        analytics
    }
}

pub async fn scheduling_analytics(
    deps: &ServerDeps,
    owner_id: OwnerId,
    now: DateTime<Utc>,
) -> Result<SchedulingAnalytics> {
    let posts = deps.store.posts_for_owner(owner_id).await?;
    Ok(SchedulingAnalytics::from_posts(&posts, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::videos::{Video, VideoStatus};
    use crate::kernel::{PipelineStore, TestDependencies};
    use chrono::{Duration, TimeZone};

    #[test]
    fn plan_spaces_videos_weekly() {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap();
        let videos = [VideoId::new(), VideoId::new(), VideoId::new()];

        let plan = plan_bulk_schedule(&videos, &[Platform::Youtube], start, Frequency::Weekly);

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].video_id, videos[0]);
        assert_eq!(plan[0].scheduled_at, start);
        assert_eq!(plan[2].scheduled_at, start + Duration::weeks(2));
        assert!(plan.iter().all(|p| p.platforms == vec![Platform::Youtube]));
    }

    #[test]
    fn analytics_counts_statuses_and_platforms() {
        let now = Utc::now();
        let owner = OwnerId::new();
        let mut published = ScheduledPost::new(
            owner,
            VideoId::new(),
            vec![Platform::Youtube, Platform::Instagram],
            now - Duration::days(1),
        );
        published.status = ScheduledPostStatus::Published;
        let upcoming =
            ScheduledPost::new(owner, VideoId::new(), vec![Platform::Youtube], now + Duration::days(1));
        let overdue =
            ScheduledPost::new(owner, VideoId::new(), vec![Platform::Instagram], now - Duration::hours(1));

        let analytics = SchedulingAnalytics::from_posts(&[published, upcoming, overdue], now);

        assert_eq!(analytics.total, 3);
        assert_eq!(analytics.published, 1);
        assert_eq!(analytics.pending, 2);
        assert_eq!(analytics.upcoming, 1);
        assert_eq!(analytics.by_platform[&Platform::Youtube], 2);
        assert_eq!(analytics.by_platform[&Platform::Instagram], 2);
    }

    #[tokio::test]
    async fn bulk_schedule_creates_a_post_per_video() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let owner = OwnerId::new();

        let mut ids = Vec::new();
        for title in ["first", "second"] {
            let mut video = Video::draft(owner, title);
            video.video_url = Some(format!("https://cdn.test/{}.mp4", title));
            video.status = VideoStatus::Completed;
            test_deps.store.insert_video(&video).await.unwrap();
            ids.push(video.id);
        }

        let start = Utc::now() + Duration::days(1);
        let plan = plan_bulk_schedule(&ids, &[Platform::Instagram], start, Frequency::Daily);
        let posts = schedule_bulk(&deps, owner, plan.clone()).await.unwrap();
        assert_eq!(posts.len(), 2);

        // Same plan again returns the same posts.
        let again = schedule_bulk(&deps, owner, plan).await.unwrap();
        assert_eq!(again[1].id, posts[1].id);

        let analytics = scheduling_analytics(&deps, owner, Utc::now()).await.unwrap();
        assert_eq!(analytics.total, 2);
        assert_eq!(analytics.upcoming, 2);
    }
}
