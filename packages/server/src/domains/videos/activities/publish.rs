use anyhow::Result;
use chrono::Utc;
use tracing::info;

use super::load_video;
use crate::common::{PipelineError, Platform};
use crate::domains::publishing::{self, PublishReport};
use crate::domains::videos::jobs::PublishVideoJob;
use crate::domains::videos::models::{Video, VideoStatus};
use crate::kernel::ServerDeps;

/// Publish `video` now and record the result on it.
///
/// The video must be `completed` or `scheduled` (or still `publishing` from an
/// interrupted attempt). Links and per-platform outcomes are merged into what
/// the video already has. One successful platform makes it `published`;
/// otherwise it becomes `failed` with the collected errors.
pub async fn publish_and_record(
    mut video: Video,
    platforms: &[Platform],
    deps: &ServerDeps,
) -> Result<(Video, PublishReport)> {
    if video.status != VideoStatus::Publishing {
        video
            .transition_to(VideoStatus::Publishing)
            .map_err(PipelineError::from)?;
        deps.store.save_video(&video).await?;
    }

    let report = publishing::publish(deps, &video, platforms).await;

    video.published_links.extend(report.published_links());
    video
        .publish_results
        .extend(report.outcomes.iter().map(|(p, o)| (*p, o.clone())));

    if report.any_succeeded() {
        video
            .transition_to(VideoStatus::Published)
            .map_err(PipelineError::from)?;
        video.published_at = Some(Utc::now());
    } else {
        let reason = report
            .failure_summary()
            .unwrap_or_else(|| "no platforms to publish to".to_string());
        video.fail(reason).map_err(PipelineError::from)?;
    }
    deps.store.save_video(&video).await?;

    info!(
        video_id = %video.id,
        status = %video.status,
        platforms = report.outcomes.len(),
        "publish recorded"
    );
    Ok((video, report))
}

/// `publish_video` job.
pub async fn publish_video_job(job: PublishVideoJob, deps: &ServerDeps) -> Result<()> {
    let video = load_video(deps, job.video_id).await?;
    if video.status == VideoStatus::Published {
        info!(video_id = %video.id, "video already published, skipping");
        return Ok(());
    }
    if job.platforms.is_empty() {
        return Err(PipelineError::data("at least one platform is required").into());
    }

    publish_and_record(video, &job.platforms, deps).await?;
    Ok(())
}
