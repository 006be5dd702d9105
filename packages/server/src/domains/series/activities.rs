use anyhow::Result;
use serde::Deserialize;
use tracing::{info, warn};

use super::models::Series;
use crate::common::{Frequency, JobId, OwnerId, PipelineError, SeriesId};
use crate::domains::videos::activities::{create_video, NewVideo};
use crate::domains::videos::{BatchGenerateJob, FollowUp, GenerateContentJob, Video};
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::{with_deadline, ServerDeps};

/// Title used when neither topic discovery nor a series provides one.
pub const FALLBACK_TITLE: &str = "New video";

#[derive(Debug, Clone, Deserialize)]
pub struct NewSeries {
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
}

pub async fn create_series(deps: &ServerDeps, input: NewSeries) -> Result<Series> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(PipelineError::data("series title must not be empty").into());
    }

    let series = Series::new(input.owner_id, title, input.description, input.frequency);
    deps.store.insert_series(&series).await?;
    info!(series_id = %series.id, owner_id = %series.owner_id, "series created");
    Ok(series)
}

pub async fn load_series(deps: &ServerDeps, series_id: SeriesId) -> Result<Series> {
    deps.store
        .find_series(series_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("series", series_id).into())
}

/// Delete a series with its videos and their scheduled posts.
pub async fn delete_series(deps: &ServerDeps, series_id: SeriesId) -> Result<()> {
    if !deps.store.delete_series(series_id).await? {
        return Err(PipelineError::not_found("series", series_id).into());
    }
    info!(series_id = %series_id, "series deleted");
    Ok(())
}

pub async fn series_videos(deps: &ServerDeps, series_id: SeriesId) -> Result<Vec<Video>> {
    load_series(deps, series_id).await?;
    deps.store.videos_for_series(series_id).await
}

/// Title for the next video: the top trending topic for the series, falling
/// back to the series title, then to [`FALLBACK_TITLE`].
///
/// Topic discovery failures are logged, not returned.
pub async fn pick_topic(deps: &ServerDeps, series: Option<&Series>) -> String {
    let niche = series.map(|s| s.title.as_str()).unwrap_or("");

    let discovered = with_deadline(
        "discover_topics",
        deps.settings.adapter_timeout,
        deps.ai.discover_topics(niche),
    )
    .await;

    match discovered {
        Ok(topics) => {
            if let Some(topic) = topics.into_iter().map(|t| t.trim().to_string()).find(|t| !t.is_empty()) {
                return topic;
            }
        }
        Err(e) => warn!(niche = %niche, error = %e, "topic discovery failed, using fallback title"),
    }

    series
        .map(|s| s.title.clone())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// Create the next draft video of a series and queue its generation.
pub async fn generate_next_video(
    deps: &ServerDeps,
    series_id: SeriesId,
    follow_up: Option<FollowUp>,
) -> Result<(Video, JobId)> {
    let series = load_series(deps, series_id).await?;
    let title = pick_topic(deps, Some(&series)).await;

    let video = create_video(
        deps,
        NewVideo {
            owner_id: series.owner_id,
            title,
            series_id: Some(series.id),
            script: None,
        },
    )
    .await?;

    let mut job = GenerateContentJob::new(video.id);
    job.follow_up = follow_up;
    let job_id = deps.job_queue.enqueue(job).await?;

    info!(series_id = %series.id, video_id = %video.id, title = %video.title, "next series video queued");
    Ok((video, job_id))
}

/// Queue a batch generation for `topics`.
pub async fn request_batch(deps: &ServerDeps, job: BatchGenerateJob) -> Result<JobId> {
    let topics: Vec<String> = job
        .topics
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if topics.is_empty() {
        return Err(PipelineError::data("at least one topic is required").into());
    }
    if let Some(series_id) = job.series_id {
        load_series(deps, series_id).await?;
    }

    let owner_id = job.owner_id;
    let job_id = deps
        .job_queue
        .enqueue(BatchGenerateJob { topics, ..job })
        .await?;
    info!(owner_id = %owner_id, job_id = %job_id, "batch generation queued");
    Ok(job_id)
}
