//! Shared plumbing for the HTTP provider clients.

use agentcost_core::ProviderError;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Provider calls can be slow for long generations.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub(crate) fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Network(format!("failed to create HTTP client: {e}")))
}

pub(crate) fn trim_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Map the response status to a [`ProviderError`] and decode a success body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    provider: &str,
) -> Result<T, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }
    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "Invalid {provider} API key"
        )));
    }
    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(provider, status, body = %error_body, "Provider API error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::ApiError {
            status_code: status,
            message: format!("Failed to parse {provider} response: {e}"),
        })
}
