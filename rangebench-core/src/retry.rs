use std::future::Future;

use crate::{RequestOutcome, RetryPolicy};

/// Transport failures, `5xx`, `408`, `425` and `429` are worth another attempt.
pub fn is_retriable(outcome: &RequestOutcome) -> bool {
    if outcome.is_success() {
        return false;
    }
    match outcome.status {
        None => true,
        Some(status) => status >= 500 || matches!(status, 408 | 425 | 429),
    }
}

/// Calls `attempt` until it succeeds, fails terminally, or the policy's retries run out.
///
/// Returns the last outcome observed.
pub async fn with_retry<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> RequestOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RequestOutcome>,
{
    let mut retries = 0u32;
    loop {
        let outcome = attempt().await;
        if retries >= policy.max_retries || !is_retriable(&outcome) {
            return outcome;
        }
        retries += 1;
        let delay = policy.base_delay * retries;
        tracing::warn!(
            status = ?outcome.status,
            error = outcome.error.as_deref().unwrap_or("none"),
            retry = retries,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "retrying fetch"
        );
        tokio::time::sleep(delay).await;
    }
}
