//! Retrying mutating calls on provider contention

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{CloudError, Result};

/// Delay before re-issuing an attach/add style call
pub const ATTACH_DELAY: Duration = Duration::from_secs(5);

/// Delay before re-issuing a detach/remove style call
pub const DETACH_DELAY: Duration = Duration::from_secs(2);

/// Retry configuration for contended provider operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed delay between attempts
    pub delay: Duration,

    /// Maximum number of attempts, `None` retries for as long as the
    /// provider keeps reporting contention
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn attach() -> Self {
        Self {
            delay: ATTACH_DELAY,
            max_attempts: None,
        }
    }

    pub fn detach() -> Self {
        Self {
            delay: DETACH_DELAY,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.map(|n| n.max(1));
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::attach()
    }
}

/// Run `call` until it succeeds or fails with a non-transient error.
///
/// Lock, conflict and rate-limit responses are retried after `policy.delay`;
/// any other error is returned annotated with `op`. Each invocation keeps its
/// own attempt count, so concurrent callers never share backoff state.
pub async fn retry_on_contention<T, F, Fut>(
    op: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(err.in_op(op)),
        };

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(CloudError::RetriesExhausted {
                op: op.to_string(),
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let cause = err.code().map(|c| c.as_str()).unwrap_or("contention");
        warn!(
            op,
            cause,
            attempt,
            delay_ms = policy.delay.as_millis() as u64,
            error = %err,
            "retrying after conflict or lock"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(CloudError::Cancelled.in_op(op)),
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
