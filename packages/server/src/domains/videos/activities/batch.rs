use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use super::{create_video, mark_video_failed, run_generation, NewVideo};
use crate::common::{PipelineError, VideoId};
use crate::domains::videos::jobs::{BatchGenerateJob, RenderVideoJob};
use crate::domains::videos::models::VideoStatus;
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub generated: Vec<VideoId>,
    pub failed_topics: Vec<String>,
}

/// `batch_generate` job: one video per topic, generated in sequence with a
/// pause between topics. A failing topic is logged and skipped.
pub async fn batch_generate(job: BatchGenerateJob, deps: &ServerDeps) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for (i, topic) in job.topics.iter().enumerate() {
        if i > 0 && !deps.settings.batch_item_delay.is_zero() {
            tokio::time::sleep(deps.settings.batch_item_delay).await;
        }

        match generate_topic(&job, topic, deps).await {
            Ok(video_id) => summary.generated.push(video_id),
            Err(e) => {
                error!(topic = %topic, error = %format!("{:#}", e), "batch topic failed");
                summary.failed_topics.push(topic.clone());
            }
        }
    }

    info!(
        owner_id = %job.owner_id,
        generated = summary.generated.len(),
        failed = summary.failed_topics.len(),
        "batch generation finished"
    );
    Ok(summary)
}

async fn generate_topic(job: &BatchGenerateJob, topic: &str, deps: &ServerDeps) -> Result<VideoId> {
    let mut video = create_video(
        deps,
        NewVideo {
            owner_id: job.owner_id,
            title: topic.to_string(),
            series_id: job.series_id,
            script: None,
        },
    )
    .await?;

    video
        .transition_to(VideoStatus::Processing)
        .map_err(PipelineError::from)?;
    deps.store.save_video(&video).await?;

    if let Err(e) = run_generation(&mut video, deps.settings.batch_max_images, deps).await {
        mark_video_failed(deps, &mut video, &e).await;
        return Err(e);
    }

    deps.job_queue
        .enqueue(RenderVideoJob {
            video_id: video.id,
            follow_up: None,
        })
        .await?;
    Ok(video.id)
}
