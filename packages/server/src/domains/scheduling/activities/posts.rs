use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::common::{OwnerId, PipelineError, Platform, ScheduledPostId, VideoId};
use crate::domains::scheduling::models::{PostUpdate, ScheduledPost, ScheduledPostStatus};
use crate::domains::videos::activities::{load_video, schedule_video};
use crate::domains::videos::VideoStatus;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledPost {
    pub owner_id: OwnerId,
    pub video_id: VideoId,
    pub platforms: Vec<Platform>,
    pub scheduled_at: DateTime<Utc>,
}

/// Schedule a post for a video the owner has rendered.
pub async fn create_scheduled_post(
    deps: &ServerDeps,
    input: NewScheduledPost,
) -> Result<ScheduledPost> {
    let video = load_video(deps, input.video_id).await?;
    if video.owner_id != input.owner_id {
        return Err(PipelineError::not_found("video", input.video_id).into());
    }
    schedule_video(input.video_id, input.scheduled_at, input.platforms, deps).await
}

pub async fn list_scheduled_posts(deps: &ServerDeps, owner_id: OwnerId) -> Result<Vec<ScheduledPost>> {
    deps.store.posts_for_owner(owner_id).await
}

/// Pending posts whose time has come, without claiming them.
pub async fn list_due_posts(deps: &ServerDeps, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
    deps.store.due_posts(now).await
}

/// Edit a pending post. The video's `scheduled_at` follows a moved post.
pub async fn update_scheduled_post(
    deps: &ServerDeps,
    post_id: ScheduledPostId,
    update: PostUpdate,
) -> Result<ScheduledPost> {
    if let Some(platforms) = &update.platforms {
        if platforms.is_empty() {
            return Err(PipelineError::data("at least one platform is required").into());
        }
    }

    let post = match deps.store.update_pending_post(post_id, &update).await? {
        Some(post) => post,
        None => return Err(not_pending(deps, post_id).await),
    };

    if let Some(at) = update.scheduled_at {
        if let Some(mut video) = deps.store.find_video(post.video_id).await? {
            if video.status == VideoStatus::Scheduled {
                video.scheduled_at = Some(at);
                deps.store.save_video(&video).await?;
            }
        }
    }

    info!(post_id = %post.id, scheduled_at = %post.scheduled_at, "scheduled post updated");
    Ok(post)
}

/// Cancel a pending post. A scheduled video left without pending posts goes
/// back to `completed`.
pub async fn cancel_scheduled_post(deps: &ServerDeps, post_id: ScheduledPostId) -> Result<()> {
    let Some(post) = deps.store.find_post(post_id).await? else {
        return Err(PipelineError::not_found("scheduled post", post_id).into());
    };
    if !deps.store.cancel_post(post_id).await? {
        return Err(not_pending(deps, post_id).await);
    }

    let remaining = deps.store.posts_for_video(post.video_id).await?;
    let still_pending = remaining
        .iter()
        .any(|p| p.status == ScheduledPostStatus::Pending);

    if !still_pending {
        if let Some(mut video) = deps.store.find_video(post.video_id).await? {
            if video.status == VideoStatus::Scheduled {
                video
                    .transition_to(VideoStatus::Completed)
                    .map_err(PipelineError::from)?;
                video.scheduled_at = None;
                deps.store.save_video(&video).await?;
            }
        }
    }

    info!(post_id = %post_id, video_id = %post.video_id, "scheduled post cancelled");
    Ok(())
}

async fn not_pending(deps: &ServerDeps, post_id: ScheduledPostId) -> anyhow::Error {
    match deps.store.find_post(post_id).await {
        Ok(Some(post)) => PipelineError::data(format!(
            "scheduled post {} is {:?} and can no longer be changed",
            post_id, post.status
        ))
        .into(),
        Ok(None) => PipelineError::not_found("scheduled post", post_id).into(),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::videos::Video;
    use crate::kernel::{PipelineStore, TestDependencies};
    use chrono::Duration;

    async fn rendered_video(test_deps: &TestDependencies, owner: OwnerId) -> Video {
        let mut video = Video::draft(owner, "Reef life");
        video.video_url = Some("https://cdn.test/video-1.mp4".into());
        video.status = VideoStatus::Completed;
        test_deps.store.insert_video(&video).await.unwrap();
        video
    }

    #[tokio::test]
    async fn cancelling_the_last_post_unschedules_the_video() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let owner = OwnerId::new();
        let video = rendered_video(&test_deps, owner).await;

        let post = create_scheduled_post(
            &deps,
            NewScheduledPost {
                owner_id: owner,
                video_id: video.id,
                platforms: vec![Platform::Youtube],
                scheduled_at: Utc::now() + Duration::hours(2),
            },
        )
        .await
        .unwrap();

        let scheduled = test_deps.store.find_video(video.id).await.unwrap().unwrap();
        assert_eq!(scheduled.status, VideoStatus::Scheduled);

        cancel_scheduled_post(&deps, post.id).await.unwrap();

        let video = test_deps.store.find_video(video.id).await.unwrap().unwrap();
        assert_eq!(video.status, VideoStatus::Completed);
        assert!(video.scheduled_at.is_none());
        assert!(list_scheduled_posts(&deps, owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn processed_posts_cannot_be_edited() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let owner = OwnerId::new();
        let video = rendered_video(&test_deps, owner).await;
        let mut post = ScheduledPost::new(owner, video.id, vec![Platform::Youtube], Utc::now());
        post.status = ScheduledPostStatus::Published;
        test_deps.store.insert_post(&post).await.unwrap();

        let update = PostUpdate {
            scheduled_at: Some(Utc::now() + Duration::days(1)),
            platforms: None,
        };
        let err = update_scheduled_post(&deps, post.id, update).await.unwrap_err();
        assert!(err.to_string().contains("can no longer be changed"));
        assert!(cancel_scheduled_post(&deps, post.id).await.is_err());
    }

    #[tokio::test]
    async fn moving_a_post_moves_the_video() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let owner = OwnerId::new();
        let video = rendered_video(&test_deps, owner).await;
        let post = create_scheduled_post(
            &deps,
            NewScheduledPost {
                owner_id: owner,
                video_id: video.id,
                platforms: vec![Platform::Instagram],
                scheduled_at: Utc::now() + Duration::hours(1),
            },
        )
        .await
        .unwrap();

        let later = post.scheduled_at + Duration::days(1);
        let updated = update_scheduled_post(
            &deps,
            post.id,
            PostUpdate {
                scheduled_at: Some(later),
                platforms: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.scheduled_at, later);
        let video = test_deps.store.find_video(video.id).await.unwrap().unwrap();
        assert_eq!(video.scheduled_at, Some(later));
    }
}
