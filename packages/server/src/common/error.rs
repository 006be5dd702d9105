//! Typed pipeline errors.
//!
//! Every adapter and processor failure is classified into one of three kinds.
//! The job runner uses the kind to decide between retry and dead-letter, and
//! the HTTP layer uses it to pick a status code.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by adapters and pipeline steps.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credentials or a disabled collaborator. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure, rate limit, provider 5xx or deadline expiry. Retried with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// Malformed provider output, invalid state transition, bad input. Never retried.
    #[error("data error: {0}")]
    Data(String),

    /// Referenced entity does not exist. Classified as a data error.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

/// Retry classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    Configuration,
    Transient,
    Data,
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::Configuration(_) => PipelineErrorKind::Configuration,
            PipelineError::Transient(_) => PipelineErrorKind::Transient,
            PipelineError::Data(_) | PipelineError::NotFound { .. } => PipelineErrorKind::Data,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == PipelineErrorKind::Transient
    }

    /// Classify a non-success HTTP response from a provider.
    ///
    /// 408/429/5xx are transient, 401/403 mean bad credentials, any other 4xx
    /// means the request itself was rejected.
    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        let msg = format!("{} returned {}: {}", provider, status, truncate(body, 500));
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            PipelineError::Transient(msg)
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            PipelineError::Configuration(msg)
        } else {
            PipelineError::Data(msg)
        }
    }

    /// Transport-level failure talking to a provider.
    pub fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        PipelineError::Transient(format!("{} request failed: {}", provider, err))
    }

    pub fn deadline_exceeded(operation: &str, limit: Duration) -> Self {
        PipelineError::Transient(format!(
            "{} did not finish within {}s",
            operation,
            limit.as_secs()
        ))
    }
}

/// Find the [`PipelineError`] inside an `anyhow` chain, if any.
pub fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>())
}

pub fn pipeline_error_kind(err: &anyhow::Error) -> Option<PipelineErrorKind> {
    pipeline_error(err).map(PipelineError::kind)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
