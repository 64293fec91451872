//! Classification of an HTTP observation into a pass / warn / fail verdict.

use std::fmt;

use matomo_ops_core::CheckLevel;
use serde::{Deserialize, Serialize};

use crate::http::Observation;

/// Substrings of an operational Matomo page (dashboard or login form).
const OPERATIONAL_MARKERS: &[&str] = &[
    "module=coredashboard",
    "module=login",
    "id=\"login_form\"",
    "piwik_dashboard",
    "matomo › web analytics reports",
];

/// Substrings of the Matomo web installer.
const INSTALLER_MARKERS: &[&str] = &[
    "module=installation",
    "matomo › installation",
    "installation status",
    "system check",
];

/// What the site appears to be doing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SiteState {
    /// Dashboard or login page is served.
    Operational,

    /// The web installer is served; setup is not finished.
    Installer,

    /// 2xx response that matches neither known page.
    Unrecognised,

    /// Non-2xx response.
    HttpError,

    /// No response at all.
    Unreachable,
}

/// Classification of one observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: CheckLevel,
    pub state: SiteState,
    pub status: Option<u16>,
    pub message: String,
}

impl Verdict {
    fn new(level: CheckLevel, state: SiteState, status: Option<u16>, message: String) -> Self {
        Self {
            level,
            state,
            status,
            message,
        }
    }

    /// Anything but a failure ends a wait.
    pub fn is_success(&self) -> bool {
        self.level != CheckLevel::Fail
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify an observation.
pub fn classify(observation: &Observation) -> Verdict {
    let (status, location, body) = match observation {
        Observation::Unreachable { error, .. } => {
            return Verdict::new(
                CheckLevel::Fail,
                SiteState::Unreachable,
                None,
                format!("site unreachable: {}", error),
            )
        }
        Observation::Response {
            status,
            location,
            body,
            ..
        } => (*status, location.as_deref(), body),
    };

    if (300..400).contains(&status) {
        let target = location.unwrap_or_default().to_ascii_lowercase();
        if target.contains("module=installation") {
            return Verdict::new(
                CheckLevel::Warn,
                SiteState::Installer,
                Some(status),
                format!("HTTP {}: redirects to the web installer", status),
            );
        }
        if target.contains("module=login") {
            return Verdict::new(
                CheckLevel::Pass,
                SiteState::Operational,
                Some(status),
                format!("HTTP {}: redirects to the login page", status),
            );
        }
    }

    if !(200..300).contains(&status) {
        let reason = if status >= 500 { "server error" } else { "unexpected status" };
        return Verdict::new(
            CheckLevel::Fail,
            SiteState::HttpError,
            Some(status),
            format!("HTTP {}: {}", status, reason),
        );
    }

    let body = body.to_lowercase();
    if contains_any(&body, OPERATIONAL_MARKERS) {
        Verdict::new(
            CheckLevel::Pass,
            SiteState::Operational,
            Some(status),
            format!("HTTP {}: Matomo is operational", status),
        )
    } else if contains_any(&body, INSTALLER_MARKERS) {
        Verdict::new(
            CheckLevel::Warn,
            SiteState::Installer,
            Some(status),
            format!("HTTP {}: web installer not yet completed", status),
        )
    } else {
        Verdict::new(
            CheckLevel::Warn,
            SiteState::Unrecognised,
            Some(status),
            format!("HTTP {}: page not recognised as Matomo", status),
        )
    }
}
