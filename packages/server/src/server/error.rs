//! Mapping of pipeline errors to HTTP responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::common::{pipeline_error, PipelineError};

/// Error returned by every route handler.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if let Some(status) = self.rejection_status() {
            return status;
        }
        match pipeline_error(&self.0) {
            Some(PipelineError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Some(PipelineError::Data(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(PipelineError::Configuration(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(PipelineError::Transient(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    fn rejection_status(&self) -> Option<StatusCode> {
        if let Some(rejection) = self.0.downcast_ref::<PathRejection>() {
            return Some(rejection.status());
        }
        if let Some(rejection) = self.0.downcast_ref::<QueryRejection>() {
            return Some(rejection.status());
        }
        self.0
            .downcast_ref::<JsonRejection>()
            .map(|rejection| rejection.status())
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), status = status.as_u16(), "request failed");
        }

        (status, Json(json!({ "error": format!("{:#}", self.0) }))).into_response()
    }
}
