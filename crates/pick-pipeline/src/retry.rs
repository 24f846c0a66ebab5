use picks_core::PickError;
use std::future::Future;
use tracing::warn;

use crate::config::StageRetry;

/// Run `op` up to `policy.attempts` times, sleeping `policy.delay` between
/// attempts. Every failure counts, including invariant violations. The last
/// error is returned once the budget is spent.
pub async fn with_retries<T, F, Fut>(
    stage: &'static str,
    ticker: &str,
    policy: StageRetry,
    mut op: F,
) -> Result<T, PickError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, PickError>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(stage, ticker, attempt, attempts, "attempt failed: {}", e);
                last_error = Some(e);
            }
        }
        if attempt < attempts && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        PickError::Validation(format!("{} for {} made no attempts", stage, ticker))
    }))
}
