//! Point-in-time health checks of a running Matomo site.
//!
//! Three HTTP checks, each reduced to pass or fail:
//!
//! | check                 | request                         | pass when           |
//! |-----------------------|---------------------------------|---------------------|
//! | availability          | `GET /`                         | 200                 |
//! | installation complete | `GET /config/config.ini.php`    | 200 or 403          |
//! | database connectivity | `GET index.php?module=API&...`  | 200, 401 or 403     |
//!
//! Redirects are followed up to [`MAX_REDIRECTS`] hops and the final
//! response is judged, so a root that redirects to the login page counts as
//! available. The root request's latency, redirects included, is reported as
//! the response time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use matomo_ops_core::{CheckLevel, CheckLine};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::{join_url, Fetch, Observation};

/// Path whose presence means the installer has written its configuration.
pub const CONFIG_PATH: &str = "config/config.ini.php";

/// Redirect hops followed per check.
pub const MAX_REDIRECTS: usize = 10;

/// Anonymous API call that needs a working database to answer.
pub const DATABASE_API_PATH: &str =
    "index.php?module=API&method=SitesManager.getSitesWithViewAccess&format=json&token_auth=anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheckKind {
    Availability,
    InstallationComplete,
    DatabaseConnectivity,
}

impl HealthCheckKind {
    pub fn label(&self) -> &'static str {
        match self {
            HealthCheckKind::Availability => "availability",
            HealthCheckKind::InstallationComplete => "installation complete",
            HealthCheckKind::DatabaseConnectivity => "database connectivity",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            HealthCheckKind::Availability => "",
            HealthCheckKind::InstallationComplete => CONFIG_PATH,
            HealthCheckKind::DatabaseConnectivity => DATABASE_API_PATH,
        }
    }

    fn accepts(&self, status: u16) -> bool {
        match self {
            HealthCheckKind::Availability => status == 200,
            HealthCheckKind::InstallationComplete => matches!(status, 200 | 403),
            HealthCheckKind::DatabaseConnectivity => matches!(status, 200 | 401 | 403),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub kind: HealthCheckKind,
    pub passed: bool,
    pub status: Option<u16>,
    pub detail: String,
}

impl HealthCheck {
    pub fn line(&self) -> CheckLine {
        let message = format!("{}: {}", self.kind.label(), self.detail);
        if self.passed {
            CheckLine::pass(message)
        } else {
            CheckLine::fail(message)
        }
    }
}

/// Result of [`check_health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub url: String,
    pub checked_at: DateTime<Utc>,
    pub checks: Vec<HealthCheck>,

    /// Latency of the root request, when it got a response.
    pub response_time_ms: Option<u64>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn lines(&self) -> Vec<CheckLine> {
        let mut lines: Vec<CheckLine> = self.checks.iter().map(HealthCheck::line).collect();
        if let Some(ms) = self.response_time_ms {
            lines.push(CheckLine::pass(format!("response time: {} ms", ms)));
        }
        lines
    }

    pub fn worst(&self) -> CheckLevel {
        if self.healthy() {
            CheckLevel::Pass
        } else {
            CheckLevel::Fail
        }
    }
}

fn evaluate(kind: HealthCheckKind, observation: &Observation) -> HealthCheck {
    match observation {
        Observation::Response { status, .. } => HealthCheck {
            kind,
            passed: kind.accepts(*status),
            status: Some(*status),
            detail: format!("HTTP {}", status),
        },
        Observation::Unreachable { error, .. } => HealthCheck {
            kind,
            passed: false,
            status: None,
            detail: format!("unreachable ({})", error),
        },
    }
}

/// GET `url`, following 3xx responses that carry a `Location`.
async fn get_following_redirects(fetch: &dyn Fetch, url: &str) -> Observation {
    let mut url = url.to_string();
    let mut total = Duration::ZERO;
    let mut hops = 0;
    loop {
        let observation = fetch.get(&url).await;
        total += observation.elapsed();
        let next = match &observation {
            Observation::Response {
                status,
                location: Some(location),
                ..
            } if (300..400).contains(status) && hops < MAX_REDIRECTS => {
                resolve_location(&url, location)
            }
            _ => None,
        };
        match next {
            Some(next) => {
                debug!(from = %url, to = %next, "following redirect");
                url = next;
                hops += 1;
            }
            None => return observation.with_elapsed(total),
        }
    }
}

fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = reqwest::Url::parse(base).ok()?;
    base.join(location).ok().map(|url| url.to_string())
}

/// Run every health check against `base_url`, one request at a time.
pub async fn check_health(fetch: &dyn Fetch, base_url: &str) -> HealthReport {
    let mut checks = Vec::new();
    let mut response_time_ms = None;

    for kind in [
        HealthCheckKind::Availability,
        HealthCheckKind::InstallationComplete,
        HealthCheckKind::DatabaseConnectivity,
    ] {
        let url = join_url(base_url, kind.path());
        let observation = get_following_redirects(fetch, &url).await;
        if kind == HealthCheckKind::Availability && observation.status().is_some() {
            response_time_ms = Some(observation.elapsed().as_millis() as u64);
        }
        let check = evaluate(kind, &observation);
        info!(
            event = "health.check",
            check = kind.label(),
            status = ?check.status,
            passed = check.passed,
        );
        checks.push(check);
    }

    HealthReport {
        url: base_url.to_string(),
        checked_at: Utc::now(),
        checks,
        response_time_ms,
    }
}
