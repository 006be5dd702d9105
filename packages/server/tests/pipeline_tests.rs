//! End-to-end pipeline runs on the in-memory store and queue.

mod common;

use chrono::{Duration, Utc};
use clipforge_core::common::{OwnerId, Platform};
use clipforge_core::domains::scheduling::activities::process_due_posts;
use clipforge_core::domains::scheduling::ScheduledPostStatus;
use clipforge_core::domains::videos::activities::{
    batch_generate, create_video, optimize_content, request_job, retry_video, schedule_video,
    NewVideo, VideoAction,
};
use clipforge_core::domains::videos::{BatchGenerateJob, FollowUp, GenerateContentJob, VideoStatus};
use clipforge_core::kernel::jobs::{JobQueueExt, JobStatus, JobType};
use clipforge_core::kernel::test_dependencies::{
    MockAI, MockFailure, MockImageGenerator, MockPlatformClient, MockRenderer, PlatformBehavior,
};
use clipforge_core::kernel::{PipelineStore, TestDependencies, PLACEHOLDER_IMAGE_URL};
use common::*;

async fn draft(pipeline: &Pipeline, title: &str) -> clipforge_core::domains::videos::Video {
    create_video(
        &pipeline.deps,
        NewVideo {
            owner_id: OwnerId::new(),
            title: title.to_string(),
            series_id: None,
            script: None,
        },
    )
    .await
    .expect("create video")
}

#[tokio::test]
async fn topic_to_published_video() {
    let pipeline = Pipeline::with_instant_retries();
    let video = draft(&pipeline, "Octopus facts").await;

    let publish_at = Utc::now() - Duration::minutes(1);
    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id).with_follow_up(FollowUp {
            scheduled_at: publish_at,
            platforms: vec![Platform::Youtube, Platform::Instagram],
        }))
        .await
        .unwrap();

    // generate_content → render_video → schedule_video
    assert_eq!(pipeline.run_until_idle().await, 3);

    let scheduled = pipeline.video(video.id).await;
    assert_eq!(scheduled.status, VideoStatus::Scheduled);
    assert!(!scheduled.script.is_empty());
    assert_eq!(scheduled.media.len(), 5);
    assert!(scheduled.narration.is_some());
    assert_eq!(scheduled.captions.len(), 2);
    assert_eq!(scheduled.hashtags, vec!["octopus", "ocean", "facts"]);
    assert!(scheduled.thumbnail_url.is_some());
    assert_eq!(scheduled.video_url.as_deref(), Some("https://cdn.test/video-1.mp4"));

    let summary = process_due_posts(&pipeline.deps, Utc::now()).await.unwrap();
    assert_eq!(summary.published, 1);

    let published = pipeline.video(video.id).await;
    assert_eq!(published.status, VideoStatus::Published);
    assert_eq!(published.published_links.len(), 2);
    assert!(published.published_at.is_some());

    let posts = pipeline.mocks.store.posts_for_video(video.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].status, ScheduledPostStatus::Published);

    for job in pipeline.mocks.job_queue.jobs() {
        assert_eq!(job.status, JobStatus::Succeeded, "{} did not succeed", job.job_type);
        assert_eq!(job.attempts, 1);
    }
}

#[tokio::test]
async fn failing_image_becomes_placeholder() {
    let mocks = TestDependencies::new()
        .mock_ai(MockAI::new().with_prompts(vec!["reef at dawn", "BROKEN kelp", "octopus den"]))
        .mock_images(MockImageGenerator::new().failing_on("BROKEN"));
    let pipeline = Pipeline::new(mocks);
    let video = draft(&pipeline, "Reef").await;

    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await
        .unwrap();
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Completed);
    let urls: Vec<&str> = video.media.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[1], PLACEHOLDER_IMAGE_URL);
    assert_ne!(urls[0], PLACEHOLDER_IMAGE_URL);
    assert_ne!(urls[2], PLACEHOLDER_IMAGE_URL);
}

#[tokio::test]
async fn image_generation_is_bounded_to_three_in_flight() {
    let pipeline = Pipeline::with_instant_retries();
    let video = draft(&pipeline, "Concurrency").await;

    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await
        .unwrap();
    pipeline.run_until_idle().await;

    // 5 scene images plus the thumbnail
    assert_eq!(pipeline.mocks.images.call_count(), 6);
    assert!(pipeline.mocks.images.peak_concurrency() <= 3);
}

#[tokio::test]
async fn transient_failure_is_retried_without_repeating_finished_steps() {
    let mocks = TestDependencies::new()
        .retry_policy(instant_retries(3))
        .mock_renderer(MockRenderer::new().failing(MockFailure::transient("render farm busy"), 1));
    let pipeline = Pipeline::new(mocks);
    let video = draft(&pipeline, "Retry me").await;

    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await
        .unwrap();
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(pipeline.mocks.ai.call_count("generate_script"), 1);

    let renders = pipeline.mocks.job_queue.jobs_of_type(JobType::RenderVideo);
    assert_eq!(renders.len(), 1);
    assert_eq!(renders[0].attempts, 2);
    assert_eq!(renders[0].status, JobStatus::Succeeded);
}

#[tokio::test]
async fn exhausted_retries_fail_the_video_and_dead_letter_the_job() {
    let mocks = TestDependencies::new()
        .retry_policy(instant_retries(2))
        .mock_ai(MockAI::new().failing_script(MockFailure::transient("rate limited"), 5));
    let pipeline = Pipeline::new(mocks);
    let video = draft(&pipeline, "Unlucky").await;

    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await
        .unwrap();
    pipeline.run_until_idle().await;

    let job = &pipeline.mocks.job_queue.jobs_of_type(JobType::GenerateContent)[0];
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert_eq!(job.attempts, 2);
    assert_eq!(pipeline.mocks.ai.call_count("generate_script"), 2);

    // A dead job is never dispatched again.
    assert_eq!(pipeline.run_until_idle().await, 0);

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(video.error_message.unwrap().contains("rate limited"));
    assert!(video.video_url.is_none());
}

#[tokio::test]
async fn configuration_error_is_not_retried() {
    let mocks = TestDependencies::new()
        .retry_policy(instant_retries(3))
        .mock_ai(MockAI::new().failing_script(MockFailure::configuration("OPENAI_API_KEY not set"), 1));
    let pipeline = Pipeline::new(mocks);
    let video = draft(&pipeline, "No key").await;

    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await
        .unwrap();
    pipeline.run_until_idle().await;

    let job = &pipeline.mocks.job_queue.jobs_of_type(JobType::GenerateContent)[0];
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert_eq!(job.attempts, 1);
    assert_eq!(pipeline.video(video.id).await.status, VideoStatus::Failed);
}

#[tokio::test]
async fn user_retry_resumes_from_existing_output() {
    let mocks = TestDependencies::new()
        .retry_policy(instant_retries(1))
        .mock_renderer(MockRenderer::new().failing(MockFailure::data("bad template"), 1));
    let pipeline = Pipeline::new(mocks);
    let video = draft(&pipeline, "Second chance").await;

    pipeline
        .deps
        .job_queue
        .enqueue(GenerateContentJob::new(video.id))
        .await
        .unwrap();
    pipeline.run_until_idle().await;
    assert_eq!(pipeline.video(video.id).await.status, VideoStatus::Failed);

    let (retried, _job_id) = retry_video(&pipeline.deps, video.id).await.unwrap();
    assert_eq!(retried.status, VideoStatus::Processing);
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(pipeline.mocks.ai.call_count("generate_script"), 1);
    assert_eq!(pipeline.mocks.images.call_count(), 6);
}

#[tokio::test]
async fn publish_with_one_failing_platform_still_publishes() {
    let mocks = TestDependencies::new().mock_platform(MockPlatformClient::new(
        Platform::Instagram,
        PlatformBehavior::ProcessingError("unsupported codec".into()),
    ));
    let pipeline = Pipeline::new(mocks);
    let video = insert_rendered_video(&pipeline.mocks, OwnerId::new(), "Fan out").await;

    request_job(
        &pipeline.deps,
        video.id,
        VideoAction::Publish {
            platforms: vec![Platform::Youtube, Platform::Instagram],
        },
    )
    .await
    .unwrap();
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Published);
    assert!(video.published_links.contains_key(&Platform::Youtube));
    assert!(!video.published_links.contains_key(&Platform::Instagram));

    let instagram = &video.publish_results[&Platform::Instagram];
    assert!(!instagram.success);
    assert!(instagram.error.as_deref().unwrap().contains("unsupported codec"));
    // ERROR status stops polling at once.
    assert_eq!(pipeline.mocks.platform(Platform::Instagram).unwrap().poll_count(), 1);
}

#[tokio::test]
async fn publish_fails_when_every_platform_fails() {
    let mocks = TestDependencies::new().without_platform(Platform::Youtube);
    let pipeline = Pipeline::new(mocks);
    let video = insert_rendered_video(&pipeline.mocks, OwnerId::new(), "Nowhere").await;

    request_job(
        &pipeline.deps,
        video.id,
        VideoAction::Publish {
            platforms: vec![Platform::Youtube],
        },
    )
    .await
    .unwrap();
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Failed);
    assert!(video.published_links.is_empty());
}

#[tokio::test]
async fn unrendered_video_cannot_be_published() {
    let pipeline = Pipeline::with_instant_retries();
    let video = draft(&pipeline, "Not yet").await;

    let err = request_job(
        &pipeline.deps,
        video.id,
        VideoAction::Publish {
            platforms: vec![Platform::Youtube],
        },
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("cannot be published"));

    // Even a raw publish job leaves it unpublished.
    pipeline
        .deps
        .job_queue
        .enqueue(clipforge_core::domains::videos::PublishVideoJob {
            video_id: video.id,
            platforms: vec![Platform::Youtube],
        })
        .await
        .unwrap();
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_ne!(video.status, VideoStatus::Published);
    assert_eq!(pipeline.mocks.platform(Platform::Youtube).unwrap().publish_count(), 0);
}

#[tokio::test]
async fn rescheduling_moves_the_pending_post() {
    let pipeline = Pipeline::with_instant_retries();
    let video = insert_rendered_video(&pipeline.mocks, OwnerId::new(), "Move me").await;
    let now = Utc::now();
    let first_at = now + Duration::hours(1);
    let second_at = now + Duration::days(3);

    let first = schedule_video(video.id, first_at, vec![Platform::Youtube], &pipeline.deps)
        .await
        .unwrap();
    let second = schedule_video(
        video.id,
        second_at,
        vec![Platform::Instagram, Platform::Youtube],
        &pipeline.deps,
    )
    .await
    .unwrap();
    assert_eq!(second.id, first.id);

    let posts = pipeline.mocks.store.posts_for_video(video.id).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].scheduled_at, second_at);
    assert_eq!(posts[0].platforms, vec![Platform::Youtube, Platform::Instagram]);

    // Nothing fires at the old time.
    let summary = process_due_posts(&pipeline.deps, first_at + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(summary.claimed, 0);
    let scheduled = pipeline.video(video.id).await;
    assert_eq!(scheduled.status, VideoStatus::Scheduled);
    assert_eq!(scheduled.scheduled_at, Some(second_at));

    let summary = process_due_posts(&pipeline.deps, second_at + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(summary.published, 1);
    assert_eq!(pipeline.video(video.id).await.status, VideoStatus::Published);
}

#[tokio::test]
async fn generation_is_idempotent_on_redelivery() {
    let pipeline = Pipeline::with_instant_retries();
    let video = draft(&pipeline, "Twice").await;

    for _ in 0..2 {
        pipeline
            .deps
            .job_queue
            .enqueue(GenerateContentJob::new(video.id))
            .await
            .unwrap();
    }
    pipeline.run_until_idle().await;

    let video = pipeline.video(video.id).await;
    assert_eq!(video.status, VideoStatus::Completed);
    assert_eq!(pipeline.mocks.ai.call_count("generate_script"), 1);
    assert_eq!(pipeline.mocks.voice.calls().len(), 1);
    assert_eq!(pipeline.mocks.renderer.requests().len(), 1);
}

#[tokio::test]
async fn batch_generates_each_topic_and_skips_failures() {
    let mocks = TestDependencies::new().mock_ai(
        MockAI::new().failing_script(MockFailure::data("policy violation"), 1),
    );
    let pipeline = Pipeline::new(mocks);
    let owner_id = OwnerId::new();

    let summary = batch_generate(
        BatchGenerateJob {
            owner_id,
            series_id: None,
            topics: vec!["Blocked topic".into(), "Squid ink".into(), "Cuttlefish".into()],
        },
        &pipeline.deps,
    )
    .await
    .unwrap();

    assert_eq!(summary.failed_topics, vec!["Blocked topic".to_string()]);
    assert_eq!(summary.generated.len(), 2);

    for id in &summary.generated {
        let video = pipeline.video(*id).await;
        assert_eq!(video.status, VideoStatus::Processing);
        assert_eq!(video.media.len(), 3);
    }

    pipeline.run_until_idle().await;
    for id in &summary.generated {
        assert_eq!(pipeline.video(*id).await.status, VideoStatus::Completed);
    }
}

#[tokio::test]
async fn optimization_is_stored_per_platform() {
    let pipeline = Pipeline::with_instant_retries();
    let video = insert_rendered_video(&pipeline.mocks, OwnerId::new(), "Optimize").await;

    let optimized = optimize_content(
        video.id,
        &[Platform::Youtube, Platform::Instagram],
        &pipeline.deps,
    )
    .await
    .unwrap();
    assert_eq!(optimized.len(), 2);

    let video = pipeline.video(video.id).await;
    assert_eq!(video.platform_optimizations[&Platform::Youtube].title, "youtube cut");
}

#[tokio::test]
async fn malformed_optimization_output_is_a_data_error() {
    let mocks = TestDependencies::new()
        .retry_policy(instant_retries(3))
        .mock_ai(MockAI::new().with_optimization_response("Sure! Here is a great title"));
    let pipeline = Pipeline::new(mocks);
    let video = insert_rendered_video(&pipeline.mocks, OwnerId::new(), "Garbled").await;

    request_job(
        &pipeline.deps,
        video.id,
        VideoAction::Optimize {
            platforms: vec![Platform::Youtube],
        },
    )
    .await
    .unwrap();
    pipeline.run_until_idle().await;

    let job = &pipeline.mocks.job_queue.jobs_of_type(JobType::OptimizeContent)[0];
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert_eq!(job.attempts, 1);
}
