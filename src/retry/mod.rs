//! retry: fixed-attempt, fixed-delay retry for remote calls.
//!
//! Every remote call in the system goes through this module: the gateway's
//! calls to the downstream services, each service's calls to its store, and
//! the store connection made at startup. Call sites differ only in the
//! [`RetryPolicy`] they pass.
//!
//! ## Contract
//!
//! - The operation is invoked at most `attempts` times.
//! - After a failed attempt that still has budget left, the executor sleeps
//!   for `delay` and tries again. There is no wait after the final attempt.
//! - When the budget runs out the last failure is returned unchanged.
//! - A policy with zero attempts fails with [`EmptyBudget`] (converted into
//!   the caller's error type) without invoking the operation.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use gateway_rust::retry::{retry, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(3000));
//! let todos = retry(&policy, "todo.list", || store.list_todos()).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Attempts used by [`RetryPolicy::default`].
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Delay used by [`RetryPolicy::default`].
pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy with a total attempt budget and a fixed delay.
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Create a policy from a delay expressed in milliseconds.
    pub const fn from_millis(attempts: u32, delay_ms: u64) -> Self {
        Self::new(attempts, Duration::from_millis(delay_ms))
    }

    /// Set the total attempt budget.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the fixed delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// The policy had no attempts to spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyBudget;

impl fmt::Display for EmptyBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry budget is empty")
    }
}

impl std::error::Error for EmptyBudget {}

/// Run `op` under `policy`, retrying every failure.
///
/// `label` names the operation in log events.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<EmptyBudget> + fmt::Display,
{
    retry_if(policy, label, op, |_| true).await
}

/// Run `op` under `policy`, retrying only failures accepted by `is_transient`.
///
/// A failure rejected by `is_transient` is returned immediately and does not
/// consume further budget.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    mut is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<EmptyBudget> + fmt::Display,
    P: FnMut(&E) -> bool,
{
    if policy.attempts == 0 {
        return Err(EmptyBudget.into());
    }

    let mut remaining = policy.attempts;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        remaining -= 1;

        if !is_transient(&err) {
            return Err(err);
        }

        if remaining == 0 {
            error!(
                op = label,
                attempts = policy.attempts,
                error = %err,
                "retry budget exhausted"
            );
            return Err(err);
        }

        warn!(
            op = label,
            remaining,
            delay_ms = policy.delay.as_millis() as u64,
            error = %err,
            "attempt failed, retrying"
        );
        tokio::time::sleep(policy.delay).await;
    }
}
