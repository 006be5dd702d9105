//! Test fixtures: an in-memory pipeline with mock adapters and helpers for
//! seeding entities.

use std::sync::Arc;

use chrono::Duration;
use clipforge_core::common::{OwnerId, VideoId};
use clipforge_core::domains::job_registry;
use clipforge_core::domains::videos::{Video, VideoStatus};
use clipforge_core::kernel::jobs::{JobRunner, JobRunnerConfig, RetryPolicy};
use clipforge_core::kernel::{PipelineStore, ServerDeps, TestDependencies};

/// Mocks, the deps built from them and a runner draining the memory queue.
pub struct Pipeline {
    pub mocks: TestDependencies,
    pub deps: Arc<ServerDeps>,
    pub runner: JobRunner,
}

impl Pipeline {
    pub fn new(mocks: TestDependencies) -> Self {
        let deps = mocks.deps();
        let runner = JobRunner::new(
            deps.job_queue.clone(),
            Arc::new(job_registry()),
            deps.clone(),
            JobRunnerConfig {
                worker_id_prefix: "test".to_string(),
                ..JobRunnerConfig::default()
            },
        );
        Self { mocks, deps, runner }
    }

    /// Default mocks with retries that become visible immediately.
    pub fn with_instant_retries() -> Self {
        Self::new(TestDependencies::new().retry_policy(instant_retries(3)))
    }

    pub async fn run_until_idle(&self) -> usize {
        self.runner
            .run_until_idle()
            .await
            .expect("runner should drain the queue")
    }

    pub async fn video(&self, id: VideoId) -> Video {
        self.mocks
            .store
            .find_video(id)
            .await
            .expect("store read")
            .expect("video exists")
    }
}

/// Retry policy without backoff so retries are visible to `run_until_idle`.
pub fn instant_retries(max_attempts: i32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_base: Duration::zero(),
        backoff_cap: Duration::zero(),
    }
}

/// Insert a video that already has a rendered file.
pub async fn insert_rendered_video(mocks: &TestDependencies, owner_id: OwnerId, title: &str) -> Video {
    let mut video = Video::draft(owner_id, title);
    video.script = "Octopuses have three hearts. They can taste with their arms!".to_string();
    video.hashtags = vec!["octopus".to_string()];
    video.video_url = Some(format!("https://cdn.test/{}.mp4", title.replace(' ', "-")));
    video.status = VideoStatus::Completed;
    mocks.store.insert_video(&video).await.expect("insert video");
    video
}
