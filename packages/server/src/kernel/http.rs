use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::common::PipelineError;

/// Build the shared reqwest client used by provider adapters.
pub fn build_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Check the status of a provider response and return it.
///
/// Transport errors are transient; non-success statuses are classified by
/// [`PipelineError::from_status`].
pub async fn checked(
    provider: &str,
    result: reqwest::Result<reqwest::Response>,
) -> Result<reqwest::Response> {
    let response = result.map_err(|e| PipelineError::from_transport(provider, e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(PipelineError::from_status(provider, status, &body).into());
    }

    Ok(response)
}

/// [`checked`], then decode the JSON body. An undecodable body is a data error.
pub async fn json<T: DeserializeOwned>(
    provider: &str,
    result: reqwest::Result<reqwest::Response>,
) -> Result<T> {
    let response = checked(provider, result).await?;
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::from_transport(provider, e))?;

    serde_json::from_str(&body).map_err(|e| {
        PipelineError::data(format!("Failed to parse {} response: {}", provider, e)).into()
    })
}
