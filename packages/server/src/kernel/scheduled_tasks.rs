//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Two due scans drive publishing:
//! - every minute: promote due scheduled posts and publish them
//! - every hour: fire due publishing calendars (generate the next video)
//!
//! ```text
//! Scheduler (every minute)
//!     └─► process_due_posts()
//!             └─► claim post → publish orchestrator → write back
//! Scheduler (every hour)
//!     └─► process_due_calendars()
//!             └─► advance calendar → draft video → enqueue generate_content
//! ```

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::scheduling::activities::{process_due_calendars, process_due_posts};
use crate::kernel::ServerDeps;

pub const POSTS_SCHEDULE: &str = "0 * * * * *";
pub const CALENDARS_SCHEDULE: &str = "0 0 * * * *";

/// Handle to the running due scans.
pub struct PublishScheduler {
    scheduler: JobScheduler,
}

impl PublishScheduler {
    /// Register both scans and start ticking.
    pub async fn start(deps: Arc<ServerDeps>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        let posts_deps = deps.clone();
        let posts_job = Job::new_async(POSTS_SCHEDULE, move |_uuid, _lock| {
            let deps = posts_deps.clone();
            Box::pin(async move {
                match process_due_posts(&deps, Utc::now()).await {
                    Ok(summary) if summary.claimed > 0 => {
                        tracing::info!(
                            claimed = summary.claimed,
                            published = summary.published,
                            failed = summary.failed,
                            "Due post scan complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Due post scan failed"),
                }
            })
        })?;
        scheduler.add(posts_job).await?;

        let calendar_deps = deps.clone();
        let calendars_job = Job::new_async(CALENDARS_SCHEDULE, move |_uuid, _lock| {
            let deps = calendar_deps.clone();
            Box::pin(async move {
                match process_due_calendars(&deps, Utc::now()).await {
                    Ok(fired) if fired > 0 => {
                        tracing::info!(fired, "Due calendar scan complete");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Due calendar scan failed"),
                }
            })
        })?;
        scheduler.add(calendars_job).await?;

        scheduler.start().await?;
        tracing::info!("Scheduled tasks started (due posts every minute, calendars every hour)");

        Ok(Self { scheduler })
    }

    /// Stop ticking. Scans already running finish on their own.
    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Scheduled tasks stopped");
        Ok(())
    }
}
