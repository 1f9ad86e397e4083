//! Retry mechanism with exponential backoff and jitter
//!
//! Used for individual multipart parts, where a transient failure should not
//! throw away the parts that already made it.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Retry a fallible async operation with exponential backoff
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation` - Async closure that returns `Result<T>`
/// * `is_retryable` - Closure that determines if an error should trigger retry
///
/// # Example
/// ```ignore
/// let part = retry_with_backoff(
///     &config,
///     || async { store.upload_part(bucket, key, upload_id, 1, body.clone()).await },
///     is_retryable_error,
/// ).await?;
/// ```
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= config.max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let backoff = calculate_backoff(config, attempt);
                tracing::debug!(
                    attempt = attempt,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "Retrying after transient error"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Calculate backoff duration with jitter
fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    // initial * 2^(attempt-1)
    let base_ms = config
        .initial_backoff_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let capped_ms = base_ms.min(config.max_backoff_ms);

    let jitter_ms = rand_jitter(capped_ms);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

/// Pseudo-random jitter in `0..max` derived from the clock
fn rand_jitter(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max.max(1)
}

/// Service codes that signal throttling or a temporary server fault
const RETRYABLE_CODES: &[&str] = &[
    "RequestTimeout",
    "ServiceUnavailable",
    "InternalError",
    "SlowDown",
    "RequestTimeTooSkewed",
];

/// Check if an error is retryable (transient)
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        // Transport failures: dispatch, timeout, truncated response
        Error::TransferFailed { source: None, .. } => true,
        Error::TransferFailed {
            source: Some(source),
            ..
        } => is_retryable_error(source),
        Error::Unknown { code: Some(code), .. } => RETRYABLE_CODES.contains(&code.as_str()),
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        Error::NotFound(_)
        | Error::AlreadyExists { .. }
        | Error::AccessDenied(_)
        | Error::ObjectTooLarge(_)
        | Error::ObjectNotActive(_)
        | Error::ConsistencyTimeout(_)
        | Error::InvalidUri(_)
        | Error::Unknown { code: None, .. }
        | Error::Config(_)
        | Error::Cancelled => false,
    }
}
