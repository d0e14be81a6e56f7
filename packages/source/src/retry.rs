//! Request sending and bounded retry helpers.
//!
//! [`send_json`] performs a single HTTP request and decodes the body,
//! mapping non-success statuses to [`SourceError::Status`]. Collectors
//! wrap each logical call in [`with_retries`], which re-runs the call up
//! to the configured retry count with exponential backoff.
//!
//! # Usage
//!
//! ```ignore
//! use district_stats_source::retry;
//!
//! let rows = retry::with_retries("sales seoul#3 I20101", 2, delay, || {
//!     source.sales(&geo_box, "I20101")
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use district_stats_source_models::ApiFamily;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Upper bound on the backoff between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Sends `request` once and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`SourceError::Http`] on transport failure,
/// [`SourceError::Status`] for 4xx/5xx responses and
/// [`SourceError::Json`] if the body is not valid JSON.
pub async fn send_json(
    family: ApiFamily,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    let url = response.url().to_string();

    if status.is_client_error() || status.is_server_error() {
        return Err(SourceError::Status {
            family,
            status: status.as_u16(),
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        let preview = if text.len() > BODY_PREVIEW_LEN {
            let mut end = BODY_PREVIEW_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &text[..end])
        } else {
            text.clone()
        };
        log::error!(
            "{family}: JSON parse failed\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len(),
        );
        SourceError::Json(e)
    })
}

/// Runs `op` until it succeeds, retrying up to `retry_count` times on
/// retryable errors.
///
/// The wait before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped
/// at one minute. A zero `base_delay` retries immediately.
///
/// # Errors
///
/// Returns the last error once every attempt has failed, or the first
/// non-retryable error.
pub async fn with_retries<T, F, Fut>(
    label: &str,
    retry_count: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retry_count && is_retryable(&e) => {
                attempt += 1;
                let delay = backoff(base_delay, attempt);
                log::warn!("{label}: {e}; retry {attempt}/{retry_count} in {delay:?}...");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff(base_delay: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base_delay.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Returns `true` if the error is likely transient and worth retrying.
///
/// Client errors other than 429, configuration problems and rows whose
/// structure does not match the family are permanent. A body that fails
/// to decode as JSON at all is treated as transient.
#[must_use]
pub const fn is_retryable(e: &SourceError) -> bool {
    match e {
        SourceError::Status { status, .. } => *status == 429 || *status >= 500,
        SourceError::MissingEndpoint(_)
        | SourceError::Parse { .. }
        | SourceError::Shape { .. } => false,
        SourceError::Http(_) | SourceError::Json(_) | SourceError::Unsuccessful { .. } => true,
    }
}
