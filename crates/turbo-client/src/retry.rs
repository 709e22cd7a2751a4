//! Retry driver for transient failures

use std::future::Future;

use tracing::warn;
use turbo_core::RetryPolicy;

use crate::error::{ClientError, Result};

/// Run `attempt` until it succeeds, fails fatally, or retries run out.
///
/// Only [`ClientError::is_retryable`] failures are retried. When the policy's
/// retries are spent the last error is wrapped in
/// [`ClientError::RetriesExhausted`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if retries >= policy.max_retries => {
                return Err(ClientError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: retries + 1,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                retries += 1;
                let delay = policy.delay_for(retries);
                warn!(
                    operation,
                    retry = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
