//! Video pipeline activities.
//!
//! Activities take `&ServerDeps` and do the work; the job handlers in
//! [`super::jobs`] and the HTTP routes are thin callers.

mod batch;
mod generate;
mod manage;
mod optimize;
mod publish;
mod render;
mod schedule;

pub use batch::{batch_generate, BatchSummary};
pub use generate::{generate_content, run_generation, thumbnail_prompt};
pub use manage::{create_video, delete_video, request_job, retry_video, NewVideo, VideoAction};
pub use optimize::optimize_content;
pub use publish::{publish_and_record, publish_video_job};
pub use render::{build_render_request, render_video, MIN_SEGMENT_SECS};
pub use schedule::schedule_video;

use anyhow::Result;
use tracing::{error, warn};

use super::models::Video;
use crate::common::{PipelineError, VideoId};
use crate::kernel::jobs::{classify_error, ErrorKind, JobContext};
use crate::kernel::ServerDeps;

/// Fetch a video or fail with a not-found data error.
pub async fn load_video(deps: &ServerDeps, video_id: VideoId) -> Result<Video> {
    deps.store
        .find_video(video_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("video", video_id).into())
}

/// True when this failure will not be retried, so the video should show it.
pub(crate) fn is_final_failure(err: &anyhow::Error, ctx: &JobContext) -> bool {
    classify_error(err) == ErrorKind::NonRetryable || ctx.is_final_attempt()
}

/// Move the video to `failed` with the error message, logging instead of
/// masking the original error if that write fails.
pub(crate) async fn mark_video_failed(deps: &ServerDeps, video: &mut Video, err: &anyhow::Error) {
    let message = format!("{:#}", err);
    if let Err(e) = video.fail(&message) {
        warn!(video_id = %video.id, status = %video.status, error = %e, "cannot mark video failed");
        return;
    }
    if let Err(e) = deps.store.save_video(video).await {
        error!(video_id = %video.id, error = %e, "failed to persist video failure");
    }
}
