use anyhow::Result;
use tracing::info;

use super::{is_final_failure, load_video, mark_video_failed};
use crate::common::PipelineError;
use crate::domains::videos::jobs::{FollowUp, RenderVideoJob, ScheduleVideoJob};
use crate::domains::videos::models::{MediaKind, Video, VideoStatus};
use crate::kernel::jobs::{JobContext, JobQueueExt};
use crate::kernel::{with_deadline, RenderRequest, RenderSegment, ServerDeps};

/// Shortest time an image stays on screen.
pub const MIN_SEGMENT_SECS: f64 = 3.0;

/// Segments split the narration evenly across the images, each at least
/// [`MIN_SEGMENT_SECS`]. Falls back to the thumbnail when there are no images.
pub fn build_render_request(video: &Video, template: &str) -> Result<RenderRequest, PipelineError> {
    let mut images: Vec<String> = video
        .media
        .iter()
        .filter(|m| m.kind == MediaKind::Image)
        .map(|m| m.url.clone())
        .collect();
    if images.is_empty() {
        images.extend(video.thumbnail_url.clone());
    }
    if images.is_empty() {
        return Err(PipelineError::data(format!(
            "video {} has no images to render",
            video.id
        )));
    }

    let share = video.narration_duration() / images.len() as f64;
    let duration_secs = share.max(MIN_SEGMENT_SECS);

    Ok(RenderRequest {
        segments: images
            .into_iter()
            .map(|image_url| RenderSegment {
                image_url,
                duration_secs,
            })
            .collect(),
        audio_url: video.narration.as_ref().map(|n| n.audio_url.clone()),
        captions: video.captions.clone(),
        template: template.to_string(),
    })
}

/// `render_video` job: render the generated assets into the final file.
pub async fn render_video(job: RenderVideoJob, ctx: JobContext, deps: &ServerDeps) -> Result<()> {
    let mut video = load_video(deps, job.video_id).await?;

    match video.status {
        VideoStatus::Processing => {}
        VideoStatus::Completed => {
            info!(video_id = %video.id, "video already rendered");
            return follow_up(&video, job.follow_up, deps).await;
        }
        VideoStatus::Scheduled | VideoStatus::Publishing | VideoStatus::Published => {
            info!(video_id = %video.id, status = %video.status, "video past rendering, skipping");
            return Ok(());
        }
        status => {
            return Err(PipelineError::data(format!(
                "video {} cannot be rendered while {}",
                video.id, status
            ))
            .into());
        }
    }

    if video.video_url.is_none() {
        if let Err(e) = render(&mut video, deps).await {
            if is_final_failure(&e, &ctx) {
                mark_video_failed(deps, &mut video, &e).await;
            }
            return Err(e);
        }
    }

    video
        .transition_to(VideoStatus::Completed)
        .map_err(PipelineError::from)?;
    deps.store.save_video(&video).await?;
    info!(video_id = %video.id, video_url = ?video.video_url, "video completed");

    follow_up(&video, job.follow_up, deps).await
}

async fn render(video: &mut Video, deps: &ServerDeps) -> Result<()> {
    let request = build_render_request(video, &deps.settings.template)?;
    let url = with_deadline(
        "render_video",
        deps.settings.render_timeout,
        deps.renderer.render_video(&request),
    )
    .await?;

    video.video_url = Some(url);
    deps.store.save_video(video).await?;
    Ok(())
}

async fn follow_up(video: &Video, follow_up: Option<FollowUp>, deps: &ServerDeps) -> Result<()> {
    let Some(follow_up) = follow_up else {
        return Ok(());
    };

    let job_id = deps
        .job_queue
        .enqueue(ScheduleVideoJob {
            video_id: video.id,
            scheduled_at: follow_up.scheduled_at,
            platforms: follow_up.platforms,
        })
        .await?;
    info!(video_id = %video.id, schedule_job_id = %job_id, "publication scheduling queued");
    Ok(())
}
