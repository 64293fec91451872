//! Matomo validation probes
//!
//! - `http`: the `Fetch` seam and its `reqwest` implementation
//! - `classify`: observation to pass / warn / fail verdict
//! - `poll`: bounded waiting until the site stops failing
//! - `health`: availability, installation and database checks
//! - `marker`: the bootstrap's status marker and install log

pub mod classify;
pub mod error;
pub mod health;
pub mod http;
pub mod marker;
pub mod poll;

pub use classify::{classify, SiteState, Verdict};
pub use error::{ProbeError, Result};
pub use health::{check_health, HealthCheck, HealthCheckKind, HealthReport, MAX_REDIRECTS};
pub use http::{join_url, validate_url, Fetch, HttpFetcher, Observation};
pub use marker::{load_install_log, scan_install_log, LogScan, StatusMarker, REMOTE_MARKER_PATH};
pub use poll::{wait_for_site, PollOutcome, PollSettings};
