//! HTTP fetching for the probes.
//!
//! [`HttpFetcher`] does not follow redirects: where Matomo redirects to
//! (installer or login) is itself part of the classification. Health checks
//! follow them through the [`Fetch`] seam instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProbeError, Result};

/// Bodies larger than this are truncated before classification.
const MAX_BODY_BYTES: usize = 512 * 1024;

/// What a single GET observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Response {
        status: u16,
        location: Option<String>,
        body: String,
        elapsed: Duration,
    },
    Unreachable {
        error: String,
        elapsed: Duration,
    },
}

impl Observation {
    pub fn status(&self) -> Option<u16> {
        match self {
            Observation::Response { status, .. } => Some(*status),
            Observation::Unreachable { .. } => None,
        }
    }

    /// Same observation with `elapsed` replaced, e.g. summed over redirects.
    pub fn with_elapsed(mut self, total: Duration) -> Self {
        match &mut self {
            Observation::Response { elapsed, .. } | Observation::Unreachable { elapsed, .. } => {
                *elapsed = total
            }
        }
        self
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Observation::Response { elapsed, .. } | Observation::Unreachable { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

/// Issues GET requests.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Observation;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Per-request timeout used by the CLI.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("matomo-ops/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> Observation {
        let start = Instant::now();
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url = %url, error = %err, "request failed");
                return Observation::Unreachable {
                    error: err.to_string(),
                    elapsed: start.elapsed(),
                };
            }
        };

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = match response.text().await {
            Ok(mut text) => {
                if text.len() > MAX_BODY_BYTES {
                    let mut cut = MAX_BODY_BYTES;
                    while !text.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    text.truncate(cut);
                }
                text
            }
            Err(err) => {
                debug!(url = %url, error = %err, "could not read body");
                String::new()
            }
        };
        let elapsed = start.elapsed();
        debug!(url = %url, status = status, elapsed_ms = elapsed.as_millis() as u64, "response");

        Observation::Response {
            status,
            location,
            body,
            elapsed,
        }
    }
}

/// Check that `url` is an absolute http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(ProbeError::InvalidUrl(url.to_string())),
    }
}

/// Join a path onto a base URL, keeping exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://203.0.113.10/", "/config/config.ini.php"),
            "http://203.0.113.10/config/config.ini.php"
        );
        assert_eq!(join_url("http://host", "index.php"), "http://host/index.php");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("http://203.0.113.10").is_ok());
        assert!(validate_url("https://analytics.example.com/").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("203.0.113.10").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_observation() {
        let fetcher = HttpFetcher::new(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let observed = fetcher.get("http://127.0.0.1:9/").await;
        assert!(matches!(observed, Observation::Unreachable { .. }));
        assert_eq!(observed.status(), None);
    }
}
