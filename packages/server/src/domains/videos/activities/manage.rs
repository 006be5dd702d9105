use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::load_video;
use crate::common::{JobId, OwnerId, PipelineError, Platform, SeriesId, VideoId};
use crate::domains::videos::jobs::{
    GenerateContentJob, OptimizeContentJob, PublishVideoJob, RenderVideoJob, ScheduleVideoJob,
};
use crate::domains::videos::models::{Video, VideoStatus};
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
pub struct NewVideo {
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default)]
    pub series_id: Option<SeriesId>,
    /// A user-supplied script skips script generation.
    #[serde(default)]
    pub script: Option<String>,
}

/// Create a draft video.
pub async fn create_video(deps: &ServerDeps, input: NewVideo) -> Result<Video> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(PipelineError::data("video title must not be empty").into());
    }

    let mut video = Video::draft(input.owner_id, title);
    if let Some(series_id) = input.series_id {
        deps.store
            .find_series(series_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("series", series_id))?;
        video = video.with_series(series_id);
    }
    if let Some(script) = input.script {
        video = video.with_script(script);
    }

    deps.store.insert_video(&video).await?;
    info!(video_id = %video.id, owner_id = %video.owner_id, "video created");
    Ok(video)
}

/// Delete a video and its scheduled posts.
pub async fn delete_video(deps: &ServerDeps, video_id: VideoId) -> Result<()> {
    if !deps.store.delete_video(video_id).await? {
        return Err(PipelineError::not_found("video", video_id).into());
    }
    info!(video_id = %video_id, "video deleted");
    Ok(())
}

/// Pipeline step a user can request for one video.
#[derive(Debug, Clone)]
pub enum VideoAction {
    Generate,
    Render,
    Schedule {
        scheduled_at: DateTime<Utc>,
        platforms: Vec<Platform>,
    },
    Publish {
        platforms: Vec<Platform>,
    },
    Optimize {
        platforms: Vec<Platform>,
    },
}

/// Queue `action` for `video_id` and return the job id.
pub async fn request_job(deps: &ServerDeps, video_id: VideoId, action: VideoAction) -> Result<JobId> {
    let video = load_video(deps, video_id).await?;
    let queue = &deps.job_queue;

    let job_id = match action {
        VideoAction::Generate => queue.enqueue(GenerateContentJob::new(video.id)).await?,
        VideoAction::Render => {
            queue
                .enqueue(RenderVideoJob {
                    video_id: video.id,
                    follow_up: None,
                })
                .await?
        }
        VideoAction::Schedule {
            scheduled_at,
            platforms,
        } => {
            require_platforms(&platforms)?;
            queue
                .enqueue(ScheduleVideoJob {
                    video_id: video.id,
                    scheduled_at,
                    platforms,
                })
                .await?
        }
        VideoAction::Publish { platforms } => {
            require_platforms(&platforms)?;
            if !matches!(video.status, VideoStatus::Completed | VideoStatus::Scheduled) {
                return Err(PipelineError::data(format!(
                    "video {} cannot be published while {}",
                    video.id, video.status
                ))
                .into());
            }
            queue
                .enqueue(PublishVideoJob {
                    video_id: video.id,
                    platforms,
                })
                .await?
        }
        VideoAction::Optimize { platforms } => {
            require_platforms(&platforms)?;
            queue
                .enqueue(OptimizeContentJob {
                    video_id: video.id,
                    platforms,
                })
                .await?
        }
    };

    info!(video_id = %video.id, job_id = %job_id, "video job requested");
    Ok(job_id)
}

fn require_platforms(platforms: &[Platform]) -> Result<(), PipelineError> {
    if platforms.is_empty() {
        return Err(PipelineError::data("at least one platform is required"));
    }
    Ok(())
}

/// User retry of a failed video.
///
/// The video goes back to `processing` when some generated output exists,
/// otherwise to `draft`, and generation is queued again. Steps whose output
/// is present are not repeated.
pub async fn retry_video(deps: &ServerDeps, video_id: VideoId) -> Result<(Video, JobId)> {
    let mut video = load_video(deps, video_id).await?;
    if video.status != VideoStatus::Failed {
        return Err(PipelineError::data(format!(
            "only failed videos can be retried (video {} is {})",
            video.id, video.status
        ))
        .into());
    }

    let target = video.retry_status();
    video.transition_to(target).map_err(PipelineError::from)?;
    deps.store.save_video(&video).await?;

    let job_id = deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await?;

    info!(video_id = %video.id, status = %video.status, job_id = %job_id, "video retry queued");
    Ok((video, job_id))
}
