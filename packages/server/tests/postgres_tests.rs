//! Postgres-backed queue and store. Run with `cargo test -- --ignored`.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use clipforge_core::common::{CalendarId, Frequency, OwnerId, Platform};
use clipforge_core::domains::scheduling::{PublishingCalendar, ScheduledPost, ScheduledPostStatus, TimeSlot};
use clipforge_core::domains::videos::{Video, VideoStatus};
use clipforge_core::kernel::jobs::{
    EnqueueOptions, ErrorKind, FailureOutcome, Job, JobQueue, JobStatus, JobType,
    PostgresJobQueue, RetryPolicy, LEASE_EXPIRED_ERROR,
};
use clipforge_core::kernel::{PipelineStore, PostgresStore};
use common::*;
use serde_json::json;
use test_context::test_context;

async fn rendered_video(store: &PostgresStore, owner_id: OwnerId) -> Video {
    let mut video = Video::draft(owner_id, "Postgres video");
    video.script = "One sentence.".to_string();
    video.video_url = Some("https://cdn.test/pg.mp4".to_string());
    video.status = VideoStatus::Completed;
    store.insert_video(&video).await.unwrap();
    video
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_claims_are_exclusive(ctx: &TestHarness) {
    let queue = Arc::new(PostgresJobQueue::new(ctx.db_pool.clone(), instant_retries(3)));
    let job_type = JobType::OptimizeContent;
    let batch = format!("claim-{}", uuid::Uuid::new_v4());

    let mut enqueued = HashSet::new();
    for i in 0..20 {
        let id = queue
            .enqueue_raw(
                job_type,
                json!({ "batch": batch, "n": i }),
                EnqueueOptions::builder().priority(100).build(),
            )
            .await
            .unwrap();
        enqueued.insert(id);
    }

    let claimers: Vec<_> = (0..5)
        .map(|w| {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = queue.claim(&format!("pg-worker-{}", w)).await.unwrap() {
                    claimed.push(job);
                }
                claimed
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for claimer in claimers {
        for job in claimer.await.unwrap() {
            if job.args["batch"] == json!(batch) {
                assert!(seen.insert(job.id), "job {} claimed twice", job.id);
                assert_eq!(job.status, JobStatus::Running);
                assert_eq!(job.attempts, 1);
            }
            queue.mark_succeeded(job.id).await.unwrap();
        }
    }
    assert_eq!(seen, enqueued);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn failures_retry_then_dead_letter(ctx: &TestHarness) {
    // Long backoff keeps the job out of reach of claims in parallel tests.
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff_base: Duration::hours(1),
        backoff_cap: Duration::hours(1),
    };
    let queue = PostgresJobQueue::new(ctx.db_pool.clone(), policy);
    let job_id = queue
        .enqueue_raw(
            JobType::RenderVideo,
            json!({}),
            EnqueueOptions::builder()
                .run_at(Utc::now() + Duration::hours(1))
                .build(),
        )
        .await
        .unwrap();

    let first = queue.mark_failed(job_id, "busy", ErrorKind::Retryable).await.unwrap();
    assert!(matches!(first, FailureOutcome::Retrying { .. }));

    let job = queue.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.last_error.as_deref(), Some("busy"));

    let outcome = queue
        .mark_failed(job_id, "bad payload", ErrorKind::NonRetryable)
        .await
        .unwrap();
    assert_eq!(outcome, FailureOutcome::DeadLettered);

    let job = queue.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::DeadLetter);
    assert!(job.dead_lettered_at.is_some());
    assert!(!queue.cancel(job_id).await.unwrap());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn expired_final_lease_is_dead_lettered(ctx: &TestHarness) {
    let policy = RetryPolicy::with_max_attempts(1);
    let queue = PostgresJobQueue::new(ctx.db_pool.clone(), policy);
    let job = Job::new(
        JobType::RenderVideo,
        json!({}),
        &EnqueueOptions::default(),
        &policy,
    );
    job.insert(&ctx.db_pool).await.unwrap();

    // Worker claimed the last attempt and died without renewing its lease.
    sqlx::query(
        "UPDATE jobs SET status = 'running', attempts = 1, worker_id = 'crashed', \
         lease_expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1",
    )
    .bind(job.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let reaped = Job::dead_letter_abandoned(&ctx.db_pool).await.unwrap();
    assert!(reaped.iter().any(|j| j.id == job.id));

    let dead = queue.find(job.id).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::DeadLetter);
    assert_eq!(dead.attempts, 1);
    assert_eq!(dead.last_error.as_deref(), Some(LEASE_EXPIRED_ERROR));
    assert!(dead.dead_lettered_at.is_some());
    assert!(dead.lease_expires_at.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn due_post_is_claimed_once(ctx: &TestHarness) {
    let store = PostgresStore::new(ctx.db_pool.clone());
    let owner_id = OwnerId::new();
    let video = rendered_video(&store, owner_id).await;

    let at = Utc::now() - Duration::minutes(5);
    let post = ScheduledPost::new(owner_id, video.id, vec![Platform::Youtube], at);
    store.insert_post(&post).await.unwrap();

    let now = Utc::now();
    let (a, b) = tokio::join!(store.claim_post(post.id, now), store.claim_post(post.id, now));
    let winners = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(Option::is_some)
        .count();
    assert_eq!(winners, 1);

    let claimed = store.find_post(post.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, ScheduledPostStatus::Processing);
    assert!(!store.cancel_post(post.id).await.unwrap());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore = "requires docker"]
async fn calendar_advance_is_compare_and_set(ctx: &TestHarness) {
    let store = PostgresStore::new(ctx.db_pool.clone());
    let fire_at = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();
    let now = Utc::now();

    let calendar = PublishingCalendar {
        id: CalendarId::new(),
        owner_id: OwnerId::new(),
        series_id: None,
        frequency: Frequency::Weekly,
        time_slots: vec![TimeSlot::new(3, 9, 0)],
        platforms: vec![Platform::Instagram],
        active: true,
        next_scheduled_at: fire_at,
        created_at: now,
        updated_at: now,
    };
    store.insert_calendar(&calendar).await.unwrap();

    let due = store.due_calendars(Utc::now()).await.unwrap();
    assert!(due.iter().any(|c| c.id == calendar.id));

    let next = fire_at + Duration::weeks(1);
    assert!(store.advance_calendar(calendar.id, fire_at, next).await.unwrap());
    assert!(!store.advance_calendar(calendar.id, fire_at, next).await.unwrap());

    let stored = store.find_calendar(calendar.id).await.unwrap().unwrap();
    assert_eq!(stored.next_scheduled_at, next);
    assert_eq!(stored.time_slots, vec![TimeSlot::new(3, 9, 0)]);
}
