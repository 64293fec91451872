//! Bounded waiting for the site to come up.

use std::time::Duration;

use matomo_ops_core::{Retried, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classify::{classify, Verdict};
use crate::http::Fetch;

/// Timeout and interval for [`wait_for_site`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(15),
        }
    }
}

impl PollSettings {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// `timeout / interval + 1`; the total sleep never exceeds the timeout.
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 1;
        }
        let gaps = self.timeout.as_nanos() / self.interval.as_nanos();
        u32::try_from(gaps).unwrap_or(u32::MAX - 1) + 1
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts(), self.interval)
    }
}

/// Final verdict of a wait and how many probes it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub verdict: Verdict,
    pub attempts: u32,
    pub timed_out: bool,
}

/// Probe `url` until the verdict is not a failure or the attempts run out.
pub async fn wait_for_site(fetch: &dyn Fetch, url: &str, settings: PollSettings) -> PollOutcome {
    info!(
        url = %url,
        timeout_secs = settings.timeout.as_secs(),
        interval_secs = settings.interval.as_secs(),
        "waiting for site"
    );

    let outcome = settings
        .policy()
        .poll("wait-for-site", |_attempt| async move {
            let verdict = classify(&fetch.get(url).await);
            if verdict.is_success() {
                Ok(verdict)
            } else {
                Err(verdict)
            }
        })
        .await;

    match outcome {
        Retried::Succeeded { value, attempts } => PollOutcome {
            verdict: value,
            attempts,
            timed_out: false,
        },
        Retried::Exhausted {
            last_error,
            attempts,
        } => PollOutcome {
            verdict: last_error,
            attempts,
            timed_out: true,
        },
    }
}
