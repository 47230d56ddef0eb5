use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::ErrorConfig;
use crate::app::Result;

const BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 5000;

/// Backoff before retry number `attempt` (zero-based): `min(1000 * 2^n, 5000)` ms.
pub fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS))
}

/// Call `op` until it succeeds or the retry budget in `config` is spent.
pub async fn with_retry<R, F, Fut>(config: &ErrorConfig, mut op: F) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let budget = if config.retryable { config.max_retries } else { 0 };
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < budget => {
                let delay = retry_delay(attempt);
                warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "Mutation failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
