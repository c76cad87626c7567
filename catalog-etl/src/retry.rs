//! Exponential backoff around calls to external systems.
//!
//! Every attempt is bounded by a per-call timeout. Only failures classified as
//! transient by [`Retryable::is_transient`] are retried; anything else is
//! returned to the caller on the first occurrence.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use catalog_etl_repository::Retryable;
use tokio::time::timeout;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

/// Backoff and timeout settings shared by every external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Total number of attempts, or `None` to retry until success.
    pub max_attempts: Option<usize>,
    /// Bound on each individual attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        // Delays grow as 2^n * factor, starting at initial_delay.
        let factor = (self.initial_delay.as_millis() as u64 / 2).max(1);
        let backoff = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter);

        match self.max_attempts {
            Some(attempts) => Box::new(backoff.take(attempts.saturating_sub(1))),
            None => Box::new(backoff),
        }
    }
}

/// Run `action` under `policy`.
///
/// # Arguments
///
/// * `policy` - Backoff, attempt limit and per-call timeout
/// * `operation` - Name used in logs and timeout errors
/// * `action` - Produces a fresh future for every attempt
///
/// # Returns
///
/// The first success, the first permanent failure, or the last transient
/// failure once the attempt limit is reached.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut action: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let call_timeout = policy.call_timeout;
    let attempt = AtomicUsize::new(0);

    RetryIf::spawn(
        policy.strategy(),
        || {
            attempt.fetch_add(1, Ordering::Relaxed);
            let call = action();
            async move {
                match timeout(call_timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(E::timed_out(operation, call_timeout)),
                }
            }
        },
        |err: &E| {
            let transient = err.is_transient();
            if transient {
                warn!(
                    operation = operation,
                    attempt = attempt.load(Ordering::Relaxed),
                    error = %err,
                    "Transient failure"
                );
            }
            transient
        },
    )
    .await
}
