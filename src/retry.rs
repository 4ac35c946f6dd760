use crate::errors::{BinanceError, Result};
use log::{error, warn};
use std::future::Future;
use tokio::time::{sleep, Duration};

/// Attempts per call before a transient failure is surfaced.
pub const MAX_TRIES: u32 = 5;
/// Pause between transient retries.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);
/// Cool-down honored after the exchange reports throttling.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Runs an adapter call with the crate's retry policy.
///
/// Transient network failures are replayed up to [`MAX_TRIES`] times with a
/// fixed [`RETRY_BACKOFF`] pause; exhaustion surfaces the last network error.
/// A rate-limit rejection sleeps [`RATE_LIMIT_COOLDOWN`] and then surfaces
/// without replaying, so the calling strategy tick exits and picks up again
/// on its next period. Every other error class surfaces immediately.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut remaining = MAX_TRIES;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                remaining -= 1;
                if remaining == 0 {
                    error!("network error: {err}");
                    return Err(err);
                }
                warn!("network error, retrying after 500ms. Remaining tries: {remaining}");
                sleep(RETRY_BACKOFF).await;
            }
            Err(err) if err.is_rate_limit() => {
                error!("rate limit exceeded: {err}");
                sleep(RATE_LIMIT_COOLDOWN).await;
                return Err(err);
            }
            Err(err) => {
                error!("exchange call failed: {err}");
                return Err(err);
            }
        }
    }
}
