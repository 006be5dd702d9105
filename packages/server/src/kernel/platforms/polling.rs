use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use super::{MediaStatus, PlatformClient};
use crate::common::PipelineError;
use crate::kernel::deadline::with_deadline;

/// Bounded polling schedule for container processing.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Deadline for a single status call.
    pub call_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Poll `container_id` until the platform reports it finished.
///
/// An `Error` status fails immediately. Transport errors and status calls
/// that overrun `call_timeout` count as attempts. Running out of attempts
/// is a transient error.
pub async fn wait_until_ready(
    client: &dyn PlatformClient,
    container_id: &str,
    policy: PollPolicy,
) -> Result<()> {
    let platform = client.platform();
    let operation = format!("{} poll", platform);

    for attempt in 1..=policy.max_attempts {
        let status = with_deadline(
            &operation,
            policy.call_timeout,
            client.poll_status(container_id),
        )
        .await;

        match status {
            Ok(MediaStatus::Finished) => {
                debug!(%platform, container_id, attempt, "media processing finished");
                return Ok(());
            }
            Ok(MediaStatus::Error(reason)) => {
                return Err(PipelineError::data(format!(
                    "{} failed to process media {}: {}",
                    platform, container_id, reason
                ))
                .into());
            }
            Ok(MediaStatus::InProgress) => {}
            Err(e) => {
                warn!(%platform, container_id, attempt, error = %e, "status poll failed");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(PipelineError::transient(format!(
        "{} media {} not ready after {} checks",
        platform, container_id, policy.max_attempts
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{pipeline_error_kind, PipelineErrorKind, Platform};
    use crate::kernel::platforms::PublishableMedia;
    use crate::kernel::platforms::PublishedMedia;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        statuses: Mutex<Vec<Result<MediaStatus, String>>>,
        polls: Mutex<u32>,
        hang: bool,
    }

    impl Scripted {
        fn new(mut statuses: Vec<Result<MediaStatus, String>>) -> Self {
            statuses.reverse();
            Self {
                statuses: Mutex::new(statuses),
                polls: Mutex::new(0),
                hang: false,
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new(vec![])
            }
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PlatformClient for Scripted {
        fn platform(&self) -> Platform {
            Platform::Instagram
        }

        async fn submit_media(&self, _media: &PublishableMedia) -> Result<String> {
            Ok("c1".into())
        }

        async fn poll_status(&self, _container_id: &str) -> Result<MediaStatus> {
            *self.polls.lock().unwrap() += 1;
            if self.hang {
                return std::future::pending().await;
            }
            match self.statuses.lock().unwrap().pop() {
                Some(Ok(status)) => Ok(status),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Ok(MediaStatus::InProgress),
            }
        }

        async fn publish(&self, _container_id: &str) -> Result<PublishedMedia> {
            unreachable!()
        }
    }

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts,
            interval: Duration::from_millis(1),
            call_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn returns_once_finished() {
        let client = Scripted::new(vec![
            Ok(MediaStatus::InProgress),
            Ok(MediaStatus::Finished),
        ]);
        wait_until_ready(&client, "c1", fast(5)).await.unwrap();
        assert_eq!(client.polls(), 2);
    }

    #[tokio::test]
    async fn error_status_fails_without_more_polls() {
        let client = Scripted::new(vec![Ok(MediaStatus::Error("bad codec".into()))]);
        let err = wait_until_ready(&client, "c1", fast(5)).await.unwrap_err();
        assert_eq!(client.polls(), 1);
        assert_eq!(pipeline_error_kind(&err), Some(PipelineErrorKind::Data));
        assert!(err.to_string().contains("bad codec"));
    }

    #[tokio::test]
    async fn transport_errors_consume_attempts() {
        let client = Scripted::new(vec![Err("reset".into()), Err("reset".into())]);
        let err = wait_until_ready(&client, "c1", fast(2)).await.unwrap_err();
        assert_eq!(client.polls(), 2);
        assert_eq!(pipeline_error_kind(&err), Some(PipelineErrorKind::Transient));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let client = Scripted::new(vec![]);
        let err = wait_until_ready(&client, "c1", fast(3)).await.unwrap_err();
        assert_eq!(client.polls(), 3);
        assert!(err.to_string().contains("not ready after 3 checks"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_call_counts_as_an_attempt() {
        let client = Scripted::hanging();
        let policy = PollPolicy {
            max_attempts: 30,
            interval: Duration::from_secs(2),
            call_timeout: Duration::from_secs(10),
        };

        let err = tokio::time::timeout(
            Duration::from_secs(24 * 60 * 60),
            wait_until_ready(&client, "c1", policy),
        )
        .await
        .expect("polling must give up on its own")
        .unwrap_err();

        assert_eq!(client.polls(), 30);
        assert_eq!(pipeline_error_kind(&err), Some(PipelineErrorKind::Transient));
        assert!(err.to_string().contains("not ready after 30 checks"));
    }
}
