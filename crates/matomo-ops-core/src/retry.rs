//! Bounded retry and polling.
//!
//! A [`RetryPolicy`] is a maximum attempt count plus a fixed delay slept
//! between attempts (never after the last one). The same policy drives both
//! retrying a failing operation ([`RetryPolicy::retry`]) and re-checking a
//! condition until it holds ([`RetryPolicy::poll`]); the two differ only in
//! how loudly intermediate failures are logged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Bounded retry policy: at most `max_attempts` tries, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts. Zero is treated as one.
    pub max_attempts: u32,

    /// Fixed delay between consecutive attempts.
    pub delay: Duration,
}

/// Final state of a bounded retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retried<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> Retried<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Retried::Succeeded { attempts, .. } | Retried::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Retried::Succeeded { .. })
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Networking stack deletion: 3 attempts, 30 seconds apart.
    pub const fn networking_teardown() -> Self {
        Self::new(3, Duration::from_secs(30))
    }

    /// Post-destroy existence checks: 6 polls, 10 seconds apart.
    pub const fn deletion_verification() -> Self {
        Self::new(6, Duration::from_secs(10))
    }

    /// Effective attempt bound.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Longest total time spent sleeping when every attempt fails.
    pub fn max_total_delay(&self) -> Duration {
        self.delay * (self.attempts() - 1)
    }

    /// Run `op` until it succeeds or the attempt bound is reached.
    ///
    /// `op` receives the 1-based attempt number. Failed attempts are logged at
    /// `warn` level.
    pub async fn retry<T, E, F, Fut>(&self, label: &str, op: F) -> Retried<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(label, true, op).await
    }

    /// Re-check a condition until it holds or the attempt bound is reached.
    ///
    /// Same contract as [`RetryPolicy::retry`], logged at `debug` level since
    /// an unmet condition is expected while waiting.
    pub async fn poll<T, E, F, Fut>(&self, label: &str, check: F) -> Retried<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(label, false, check).await
    }

    async fn run<T, E, F, Fut>(&self, label: &str, loud: bool, mut op: F) -> Retried<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    return Retried::Succeeded {
                        value,
                        attempts: attempt,
                    }
                }
                Err(err) if attempt >= max_attempts => {
                    if loud {
                        warn!(event = "retry.exhausted", label = %label, attempts = attempt, error = %err);
                    } else {
                        debug!(event = "retry.exhausted", label = %label, attempts = attempt, error = %err);
                    }
                    return Retried::Exhausted {
                        last_error: err,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    if loud {
                        warn!(
                            event = "retry.scheduled",
                            label = %label,
                            attempt = attempt,
                            max_attempts = max_attempts,
                            delay_secs = self.delay.as_secs(),
                            error = %err,
                        );
                    } else {
                        debug!(
                            event = "retry.scheduled",
                            label = %label,
                            attempt = attempt,
                            max_attempts = max_attempts,
                            error = %err,
                        );
                    }
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
