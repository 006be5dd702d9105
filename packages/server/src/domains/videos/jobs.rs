//! Job payloads for the video pipeline and their registration.
//!
//! Each payload is enqueued with [`JobQueueExt::enqueue`](crate::kernel::jobs::JobQueueExt)
//! and dispatched by the runner to the matching activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activities;
use crate::common::{OwnerId, Platform, SeriesId, VideoId};
use crate::kernel::jobs::{CommandMeta, JobRegistry, JobType};

/// Publication to schedule once the video has been rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub scheduled_at: DateTime<Utc>,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentJob {
    pub video_id: VideoId,
    #[serde(default)]
    pub follow_up: Option<FollowUp>,
}

impl GenerateContentJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            follow_up: None,
        }
    }

    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = Some(follow_up);
        self
    }
}

impl CommandMeta for GenerateContentJob {
    fn job_type(&self) -> JobType {
        JobType::GenerateContent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderVideoJob {
    pub video_id: VideoId,
    #[serde(default)]
    pub follow_up: Option<FollowUp>,
}

impl CommandMeta for RenderVideoJob {
    fn job_type(&self) -> JobType {
        JobType::RenderVideo
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleVideoJob {
    pub video_id: VideoId,
    pub scheduled_at: DateTime<Utc>,
    pub platforms: Vec<Platform>,
}

impl CommandMeta for ScheduleVideoJob {
    fn job_type(&self) -> JobType {
        JobType::ScheduleVideo
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishVideoJob {
    pub video_id: VideoId,
    pub platforms: Vec<Platform>,
}

impl CommandMeta for PublishVideoJob {
    fn job_type(&self) -> JobType {
        JobType::PublishVideo
    }

    // Immediate publishes jump ahead of background generation.
    fn priority(&self) -> i16 {
        10
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeContentJob {
    pub video_id: VideoId,
    pub platforms: Vec<Platform>,
}

impl CommandMeta for OptimizeContentJob {
    fn job_type(&self) -> JobType {
        JobType::OptimizeContent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGenerateJob {
    pub owner_id: OwnerId,
    #[serde(default)]
    pub series_id: Option<SeriesId>,
    pub topics: Vec<String>,
}

impl CommandMeta for BatchGenerateJob {
    fn job_type(&self) -> JobType {
        JobType::BatchGenerate
    }

    fn priority(&self) -> i16 {
        -10
    }
}

/// Register a handler for every pipeline job type.
pub fn register_video_jobs(registry: &mut JobRegistry) {
    registry.register::<GenerateContentJob, _, _>(
        JobType::GenerateContent,
        |job, ctx, deps| async move { activities::generate_content(job, ctx, &deps).await },
    );

    registry.register::<RenderVideoJob, _, _>(JobType::RenderVideo, |job, ctx, deps| async move {
        activities::render_video(job, ctx, &deps).await
    });

    registry.register::<ScheduleVideoJob, _, _>(JobType::ScheduleVideo, |job, _ctx, deps| async move {
        activities::schedule_video(job.video_id, job.scheduled_at, job.platforms, &deps)
            .await
            .map(|_| ())
    });

    registry.register::<PublishVideoJob, _, _>(JobType::PublishVideo, |job, _ctx, deps| async move {
        activities::publish_video_job(job, &deps).await
    });

    registry.register::<OptimizeContentJob, _, _>(
        JobType::OptimizeContent,
        |job, _ctx, deps| async move {
            activities::optimize_content(job.video_id, &job.platforms, &deps)
                .await
                .map(|_| ())
        },
    );

    registry.register::<BatchGenerateJob, _, _>(JobType::BatchGenerate, |job, _ctx, deps| async move {
        activities::batch_generate(job, &deps).await.map(|_| ())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_job_type_has_a_handler() {
        let mut registry = JobRegistry::new();
        register_video_jobs(&mut registry);
        for job_type in JobType::ALL {
            assert!(registry.is_registered(job_type), "{} not registered", job_type);
        }
    }

    #[test]
    fn follow_up_is_optional_in_payload() {
        let id = VideoId::new();
        let job: GenerateContentJob =
            serde_json::from_value(serde_json::json!({ "video_id": id })).unwrap();
        assert!(job.follow_up.is_none());
        assert_eq!(job.job_type(), JobType::GenerateContent);
    }
}
