//! Polling and health checks against a scripted fetcher.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use matomo_ops_core::CheckLevel;
use matomo_ops_probe::{
    check_health, wait_for_site, Fetch, HealthCheckKind, HealthReport, Observation, PollSettings,
    SiteState, StatusMarker, MAX_REDIRECTS,
};
use tokio::time::Instant;

/// Replays observations in order; the last one repeats once the script runs out.
struct ScriptedFetch {
    script: Mutex<VecDeque<Observation>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetch {
    fn new(script: Vec<Observation>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn get(&self, url: &str) -> Observation {
        self.requested.lock().unwrap().push(url.to_string());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

fn page(status: u16, body: &str) -> Observation {
    Observation::Response {
        status,
        location: None,
        body: body.to_string(),
        elapsed: Duration::from_millis(85),
    }
}

fn redirect(to: &str) -> Observation {
    Observation::Response {
        status: 302,
        location: Some(to.to_string()),
        body: String::new(),
        elapsed: Duration::from_millis(40),
    }
}

fn refused() -> Observation {
    Observation::Unreachable {
        error: "connection refused".to_string(),
        elapsed: Duration::from_millis(1),
    }
}

const LOGIN_PAGE: &str = r#"<form id="login_form" action="index.php?module=Login&action=login">"#;
const INSTALLER_PAGE: &str = "<title>Matomo › Installation</title>";

#[tokio::test(start_paused = true)]
async fn wait_stops_at_first_non_failing_verdict() {
    let fetch = ScriptedFetch::new(vec![refused(), page(502, "Bad Gateway"), page(200, LOGIN_PAGE)]);
    let settings = PollSettings::new(Duration::from_secs(60), Duration::from_secs(10));
    let start = Instant::now();

    let outcome = wait_for_site(&fetch, "http://203.0.113.10/", settings).await;

    assert!(!outcome.timed_out);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.verdict.state, SiteState::Operational);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn installer_page_ends_the_wait_with_a_warning() {
    let fetch = ScriptedFetch::new(vec![page(200, INSTALLER_PAGE)]);

    let outcome = wait_for_site(&fetch, "http://host/", PollSettings::default()).await;

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.verdict.level, CheckLevel::Warn);
    assert_eq!(outcome.verdict.state, SiteState::Installer);
}

#[tokio::test(start_paused = true)]
async fn wait_never_sleeps_past_the_timeout() {
    let fetch = ScriptedFetch::new(vec![refused()]);
    let settings = PollSettings::new(Duration::from_secs(25), Duration::from_secs(10));
    let start = Instant::now();

    let outcome = wait_for_site(&fetch, "http://host/", settings).await;

    assert!(outcome.timed_out);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(fetch.requested().len(), 3);
    assert_eq!(outcome.verdict.state, SiteState::Unreachable);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
    assert!(start.elapsed() <= settings.timeout);
}

#[tokio::test]
async fn healthy_site_passes_every_check() {
    let fetch = ScriptedFetch::new(vec![page(200, LOGIN_PAGE), page(403, ""), page(401, "{}")]);

    let report = check_health(&fetch, "http://203.0.113.10").await;

    assert!(report.healthy());
    assert_eq!(report.response_time_ms, Some(85));
    assert_eq!(
        fetch.requested(),
        vec![
            "http://203.0.113.10/".to_string(),
            "http://203.0.113.10/config/config.ini.php".to_string(),
            "http://203.0.113.10/index.php?module=API&method=SitesManager.getSitesWithViewAccess&format=json&token_auth=anonymous".to_string(),
        ]
    );
    assert_eq!(report.lines().len(), 4);
}

#[tokio::test]
async fn missing_config_fails_installation_check() {
    let fetch = ScriptedFetch::new(vec![page(200, INSTALLER_PAGE), page(404, ""), page(500, "")]);

    let report = check_health(&fetch, "http://host/").await;

    assert!(!report.healthy());
    assert_eq!(report.worst(), CheckLevel::Fail);
    let failed: Vec<HealthCheckKind> = report
        .checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.kind)
        .collect();
    assert_eq!(
        failed,
        vec![
            HealthCheckKind::InstallationComplete,
            HealthCheckKind::DatabaseConnectivity
        ]
    );
}

#[tokio::test]
async fn unreachable_site_has_no_response_time() {
    let fetch = ScriptedFetch::new(vec![refused()]);

    let report = check_health(&fetch, "http://host").await;

    assert!(report.checks.iter().all(|c| !c.passed));
    assert_eq!(report.response_time_ms, None);
}

#[tokio::test]
async fn root_redirecting_to_login_is_available() {
    let fetch = ScriptedFetch::new(vec![
        redirect("index.php?module=Login"),
        page(200, LOGIN_PAGE),
        page(403, ""),
        page(401, "{}"),
    ]);

    let report = check_health(&fetch, "http://203.0.113.10").await;

    assert!(report.healthy());
    assert_eq!(report.checks[0].kind, HealthCheckKind::Availability);
    assert_eq!(report.checks[0].status, Some(200));
    assert_eq!(report.response_time_ms, Some(125));
    let requested = fetch.requested();
    assert_eq!(requested[0], "http://203.0.113.10/");
    assert_eq!(requested[1], "http://203.0.113.10/index.php?module=Login");
}

#[tokio::test]
async fn redirect_loop_fails_after_bounded_hops() {
    let fetch = ScriptedFetch::new(vec![redirect("/")]);

    let report = check_health(&fetch, "http://host").await;

    assert!(report.checks.iter().all(|c| !c.passed));
    assert_eq!(report.checks[0].status, Some(302));
    assert_eq!(fetch.requested().len(), 3 * (MAX_REDIRECTS + 1));
}

#[tokio::test]
async fn health_report_json_matches_cli_output() {
    let fetch = ScriptedFetch::new(vec![page(200, LOGIN_PAGE), page(404, ""), page(401, "{}")]);
    let report = check_health(&fetch, "http://203.0.113.10").await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["url"], "http://203.0.113.10");
    assert_eq!(json["response_time_ms"], 85);
    assert_eq!(json["checks"][1]["kind"], "installation_complete");
    assert_eq!(json["checks"][1]["passed"], false);
    assert_eq!(json["checks"][1]["status"], 404);

    let back: HealthReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}

#[tokio::test]
async fn marker_is_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matomo-install-status");
    std::fs::write(
        &path,
        "STATUS=completed\nCOMPLETED_AT=2024-05-01 10:15:00\nDB_HOST=localhost\n",
    )
    .unwrap();

    let marker = StatusMarker::load(&path).await.unwrap();
    assert!(marker.is_complete());

    let missing = StatusMarker::load(&dir.path().join("absent")).await;
    assert!(missing.is_err());
}
