//! Shared HTTP plumbing for the live adapters.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::ProviderError;

/// Builds a client with a request timeout.
pub(crate) fn build_client(
    timeout: Duration,
    accept_invalid_certs: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
}

/// Maps a transport failure (connect, TLS, timeout, body read) to `Unavailable`.
///
/// The URL is dropped from the message: request queries may carry credentials.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> ProviderError {
    let err = err.without_url();
    if err.is_timeout() {
        return ProviderError::unavailable(provider, format!("request timed out: {err}"));
    }
    ProviderError::unavailable(provider, format!("request failed: {err}"))
}

/// Server-side and throttling statuses are transient; any other non-2xx is a refusal.
pub(crate) fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Ensures a 2xx status, converting anything else into a classified error
/// carrying the provider's own message.
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let message = format!("HTTP {}: {}", status.as_u16(), error_message(&body));

    if is_transient(status) {
        Err(ProviderError::unavailable(provider, message))
    } else {
        Err(ProviderError::rejected(provider, message))
    }
}

/// Decodes a successful JSON body.
///
/// A 2xx whose body cannot be decoded is reported as rejected: the provider
/// may have acted on the request, so it must not be retried blindly.
pub(crate) async fn parse_response<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let response = ensure_success(provider, response).await?;
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::rejected(provider, format!("unexpected response ({e}): {body}"))
    })
}

/// Pulls a human-readable message out of an error body.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    for key in ["message", "error", "reason"] {
        match value.get(key) {
            Some(serde_json::Value::String(text)) => return text.clone(),
            Some(serde_json::Value::Object(inner)) => {
                if let Some(serde_json::Value::String(text)) = inner.get("message") {
                    return text.clone();
                }
            }
            _ => {}
        }
    }
    body.trim().to_string()
}
