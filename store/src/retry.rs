use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing;

use crate::StoreError;

/// Retries transient store failures with a doubling delay. Only use for
/// idempotent operations: a failed attempt may still have landed.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && e.is_transient() => {
                attempt += 1;
                tracing::warn!(attempt, ?delay, error = %e, "store operation failed, retrying");
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
