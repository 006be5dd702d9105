use axum::extract::Extension;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::jobs::JobAccepted;
use crate::common::{JobId, Platform, SeriesId};
use crate::domains::series::activities::{
    create_series, delete_series, generate_next_video, load_series, request_batch, series_videos,
    NewSeries,
};
use crate::domains::series::Series;
use crate::domains::videos::{BatchGenerateJob, FollowUp, Video};
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::extract::{Json, Path};

/// Optional publication for the generated video.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateNextRequest {
    #[serde(default)]
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Serialize)]
pub struct GenerateNextResponse {
    pub video: Video,
    pub job_id: JobId,
}

pub async fn create(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewSeries>,
) -> ApiResult<(StatusCode, Json<Series>)> {
    let series = create_series(&state.deps, input).await?;
    Ok((StatusCode::CREATED, Json(series)))
}

pub async fn get(
    Extension(state): Extension<AppState>,
    Path(series_id): Path<SeriesId>,
) -> ApiResult<Json<Series>> {
    Ok(Json(load_series(&state.deps, series_id).await?))
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    Path(series_id): Path<SeriesId>,
) -> ApiResult<StatusCode> {
    delete_series(&state.deps, series_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn videos(
    Extension(state): Extension<AppState>,
    Path(series_id): Path<SeriesId>,
) -> ApiResult<Json<Vec<Video>>> {
    Ok(Json(series_videos(&state.deps, series_id).await?))
}

/// `POST /series/:id/generate-next`. A body with `scheduled_at` and
/// `platforms` schedules the video once it is rendered.
pub async fn generate_next(
    Extension(state): Extension<AppState>,
    Path(series_id): Path<SeriesId>,
    body: Option<Json<GenerateNextRequest>>,
) -> ApiResult<(StatusCode, Json<GenerateNextResponse>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let follow_up = request
        .scheduled_at
        .filter(|_| !request.platforms.is_empty())
        .map(|scheduled_at| FollowUp {
            scheduled_at,
            platforms: request.platforms.clone(),
        });

    let (video, job_id) = generate_next_video(&state.deps, series_id, follow_up).await?;
    Ok((StatusCode::ACCEPTED, Json(GenerateNextResponse { video, job_id })))
}

pub async fn batch_generate(
    Extension(state): Extension<AppState>,
    Json(job): Json<BatchGenerateJob>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = request_batch(&state.deps, job).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}
