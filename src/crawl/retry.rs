//! Fixed-delay retry around a single remote call.

use std::future::Future;
use std::time::Duration;

use crate::directory::DirectoryError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: usize,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

/// Run `op` until it succeeds, hits a non-retryable error, or the attempt
/// ceiling is reached. The last error is returned on exhaustion.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    id: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, DirectoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                log::warn!(
                    "{} {}: attempt {}/{} failed: {}",
                    label,
                    id,
                    attempt,
                    max_attempts,
                    e
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(e) => {
                log::error!("{} {}: giving up after {} attempt(s): {}", label, id, attempt, e);
                return Err(e);
            }
        }
    }
}
