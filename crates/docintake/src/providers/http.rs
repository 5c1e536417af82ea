//! Shared HTTP plumbing for the cloud adapters.

use std::time::Duration;

use reqwest::StatusCode;

use super::{ProviderError, ProviderErrorCode};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider response body quoted in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Builds a fresh client for one call. Never cached across calls.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::unknown(format!("Failed to build HTTP client: {}", e)))
}

/// Maps a non-success HTTP status to the generic error classes.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let code = match status.as_u16() {
        401 | 403 => ProviderErrorCode::AuthFailed,
        429 => ProviderErrorCode::QuotaExceeded,
        400 | 413 | 415 | 422 => ProviderErrorCode::InvalidInput,
        _ => ProviderErrorCode::Unknown,
    };
    ProviderError::new(
        code,
        format!("{} returned {}: {}", provider, status, truncate(body)),
    )
}

/// Maps Google RPC status codes carried in response bodies.
pub fn classify_rpc_code(provider: &str, rpc_code: i32, message: &str) -> ProviderError {
    let code = match rpc_code {
        3 | 11 => ProviderErrorCode::InvalidInput,
        7 | 16 => ProviderErrorCode::AuthFailed,
        8 => ProviderErrorCode::QuotaExceeded,
        _ => ProviderErrorCode::Unknown,
    };
    ProviderError::new(
        code,
        format!("{} error {}: {}", provider, rpc_code, truncate(message)),
    )
}

/// Transport-level failures: connection refused, TLS, read timeouts.
pub fn classify_transport(provider: &str, error: &reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        return ProviderError {
            code: ProviderErrorCode::Unknown,
            message: format!("{} request timed out: {}", provider, error),
            timed_out: true,
        };
    }
    ProviderError::unknown(format!("{} request failed: {}", provider, error))
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((i, _)) => format!("{}...", &trimmed[..i]),
        None => trimmed.to_string(),
    }
}
