use axum::extract::Extension;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::jobs::JobAccepted;
use crate::common::{JobId, Platform, VideoId};
use crate::domains::videos::activities::{
    create_video, delete_video, load_video, request_job, retry_video, NewVideo, VideoAction,
};
use crate::domains::videos::Video;
use crate::server::app::AppState;
use crate::server::error::ApiResult;
use crate::server::extract::{Json, Path};

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformsRequest {
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub video: Video,
    pub job_id: JobId,
}

pub async fn create(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewVideo>,
) -> ApiResult<(StatusCode, Json<Video>)> {
    let video = create_video(&state.deps, input).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

pub async fn get(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<Json<Video>> {
    Ok(Json(load_video(&state.deps, video_id).await?))
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<StatusCode> {
    delete_video(&state.deps, video_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn accept(state: &AppState, video_id: VideoId, action: VideoAction) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = request_job(&state.deps, video_id, action).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

pub async fn generate(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    accept(&state, video_id, VideoAction::Generate).await
}

pub async fn render(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    accept(&state, video_id, VideoAction::Render).await
}

pub async fn schedule(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
    Json(request): Json<ScheduleRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let action = VideoAction::Schedule {
        scheduled_at: request.scheduled_at,
        platforms: request.platforms,
    };
    accept(&state, video_id, action).await
}

pub async fn publish(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
    Json(request): Json<PlatformsRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let action = VideoAction::Publish {
        platforms: request.platforms,
    };
    accept(&state, video_id, action).await
}

pub async fn optimize(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
    Json(request): Json<PlatformsRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let action = VideoAction::Optimize {
        platforms: request.platforms,
    };
    accept(&state, video_id, action).await
}

pub async fn retry(
    Extension(state): Extension<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<(StatusCode, Json<RetryResponse>)> {
    let (video, job_id) = retry_video(&state.deps, video_id).await?;
    Ok((StatusCode::ACCEPTED, Json(RetryResponse { video, job_id })))
}
