use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use super::load_video;
use crate::common::{PipelineError, Platform, VideoId};
use crate::domains::scheduling::models::{PostUpdate, ScheduledPost, ScheduledPostStatus};
use crate::domains::videos::models::VideoStatus;
use crate::kernel::ServerDeps;

/// Schedule a rendered video for publication.
///
/// The video moves to `scheduled` and a pending post is created; the due scan
/// publishes it once `scheduled_at` passes. Re-running with the same instant
/// and platforms returns the existing pending post. Rescheduling moves the
/// pending post instead of adding another, so a video has at most one.
pub async fn schedule_video(
    video_id: VideoId,
    scheduled_at: DateTime<Utc>,
    platforms: Vec<Platform>,
    deps: &ServerDeps,
) -> Result<ScheduledPost> {
    let mut platforms = platforms;
    platforms.sort();
    platforms.dedup();
    if platforms.is_empty() {
        return Err(PipelineError::data("at least one platform is required").into());
    }

    let mut video = load_video(deps, video_id).await?;
    if !matches!(video.status, VideoStatus::Completed | VideoStatus::Scheduled) {
        return Err(PipelineError::data(format!(
            "video {} must be completed before scheduling (is {})",
            video.id, video.status
        ))
        .into());
    }

    let pending: Vec<ScheduledPost> = deps
        .store
        .posts_for_video(video.id)
        .await?
        .into_iter()
        .filter(|p| p.status == ScheduledPostStatus::Pending)
        .collect();
    if let Some(post) = pending
        .iter()
        .find(|p| p.scheduled_at == scheduled_at && p.platforms == platforms)
    {
        if pending.len() == 1 {
            info!(video_id = %video.id, post_id = %post.id, "video already scheduled");
            return Ok(post.clone());
        }
    }

    video
        .transition_to(VideoStatus::Scheduled)
        .map_err(PipelineError::from)?;
    video.scheduled_at = Some(scheduled_at);
    deps.store.save_video(&video).await?;

    let update = PostUpdate {
        scheduled_at: Some(scheduled_at),
        platforms: Some(platforms.clone()),
    };
    let mut moved = None;
    for post in &pending {
        if moved.is_none() {
            moved = deps.store.update_pending_post(post.id, &update).await?;
            if moved.is_some() {
                continue;
            }
        }
        if deps.store.cancel_post(post.id).await? {
            info!(video_id = %video.id, post_id = %post.id, "superseded post cancelled");
        }
    }

    if let Some(post) = moved {
        info!(
            video_id = %video.id,
            post_id = %post.id,
            scheduled_at = %scheduled_at,
            "video rescheduled"
        );
        return Ok(post);
    }

    let post = ScheduledPost::new(video.owner_id, video.id, platforms, scheduled_at);
    deps.store.insert_post(&post).await?;

    info!(
        video_id = %video.id,
        post_id = %post.id,
        scheduled_at = %scheduled_at,
        "video scheduled"
    );
    Ok(post)
}
