//! Shared HTTP plumbing for the wire transports

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::error::ProviderError;

/// Per-request timeout for backend calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a non-success HTTP status and body to a classified error
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, MAX_ERROR_BODY));
    let provider = provider.to_string();
    let lowered = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS || is_quota_exhausted(&lowered) {
        return ProviderError::RateLimited { provider, message };
    }

    match status.as_u16() {
        // 529 is Anthropic's "overloaded"
        502 | 503 | 504 | 529 => ProviderError::Unavailable { provider, message },
        _ if status.is_server_error() && lowered.contains("overloaded") => {
            ProviderError::Unavailable { provider, message }
        }
        _ => ProviderError::Other { provider, message },
    }
}

fn is_quota_exhausted(lowered_body: &str) -> bool {
    lowered_body.contains("resource_exhausted")
        || lowered_body.contains("insufficient_quota")
        || lowered_body.contains("quota exceeded")
        || lowered_body.contains("exceeded your current quota")
}

/// Map a transport-level failure (no HTTP response) to a classified error
pub(crate) fn classify_transport_error(provider: &str, err: &reqwest::Error) -> ProviderError {
    let provider = provider.to_string();
    let message = err.to_string();
    if err.is_timeout() || err.is_connect() {
        ProviderError::Unavailable { provider, message }
    } else if err.is_decode() {
        ProviderError::MalformedResponse { provider, message }
    } else {
        ProviderError::Other { provider, message }
    }
}

/// POST a JSON body and decode the JSON response, classifying any failure
pub(crate) async fn post_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &Value,
) -> Result<T, ProviderError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| classify_transport_error(provider, &e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| classify_transport_error(provider, &e))?;

    if !status.is_success() {
        debug!(provider = provider, status = status.as_u16(), "Backend returned error status");
        return Err(classify_status(provider, status, &text));
    }

    serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
        provider: provider.to_string(),
        message: format!("undecodable body: {e}"),
    })
}

pub(crate) fn malformed(provider: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::MalformedResponse {
        provider: provider.to_string(),
        message: message.into(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let err = classify_status("openai", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_quota_body_is_rate_limited() {
        let err = classify_status(
            "google",
            StatusCode::FORBIDDEN,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, ProviderError::RateLimited { .. }));

        let err = classify_status(
            "openai",
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"insufficient_quota"}}"#,
        );
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[test]
    fn test_overload_statuses_are_unavailable() {
        for code in [502u16, 503, 504, 529] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_status("anthropic", status, "");
            assert!(matches!(err, ProviderError::Unavailable { .. }), "{code}");
        }
        let err = classify_status("anthropic", StatusCode::INTERNAL_SERVER_ERROR, "Overloaded");
        assert!(matches!(err, ProviderError::Unavailable { .. }));
    }

    #[test]
    fn test_overloaded_body_on_client_error_is_not_retryable() {
        let err = classify_status(
            "anthropic",
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"prompt mentions an overloaded function"}}"#,
        );
        assert!(matches!(err, ProviderError::Other { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_auth_errors_are_not_retryable() {
        let err = classify_status("openai", StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, ProviderError::Other { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_body_is_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let err = classify_status("openai", StatusCode::BAD_REQUEST, &body);
        let ProviderError::Other { message, .. } = err else {
            panic!("expected Other");
        };
        assert!(message.len() <= MAX_ERROR_BODY + 20);
    }
}
