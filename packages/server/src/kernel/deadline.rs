//! Hard deadlines around adapter calls.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::common::PipelineError;

/// Run `fut`, failing with a transient [`PipelineError`] if it takes longer than `limit`.
pub async fn with_deadline<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation = %operation, limit_secs = limit.as_secs(), "adapter call timed out");
            Err(PipelineError::deadline_exceeded(operation, limit).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{pipeline_error_kind, PipelineErrorKind};

    #[tokio::test(start_paused = true)]
    async fn slow_call_becomes_transient_error() {
        let err = with_deadline("render", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(pipeline_error_kind(&err), Some(PipelineErrorKind::Transient));
        assert!(err.to_string().contains("render"));
    }

    #[tokio::test]
    async fn fast_call_passes_result_through() {
        let value = with_deadline("script", Duration::from_secs(5), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
