//! Reading the bootstrap's status marker and install log.
//!
//! The first-boot script writes `/var/log/matomo-install-status` with a
//! completion timestamp and the database connection parameters, and appends
//! progress to an install log. Operators copy either file off the instance
//! and point `matomo-ops validate --marker/--log` at the local copy.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use matomo_ops_core::CheckLine;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// Path of the marker on the instance.
pub const REMOTE_MARKER_PATH: &str = "/var/log/matomo-install-status";

const TIMESTAMP_KEYS: &[&str] = &["COMPLETED_AT", "INSTALLATION_COMPLETED", "COMPLETED", "TIMESTAMP"];
const SECRET_KEYS: &[&str] = &["DB_SECRET_ARN", "DB_SECRET", "SECRET_ARN"];

/// Parsed status marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMarker {
    pub completed_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub db_host: Option<String>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_secret: Option<String>,

    /// Every other key, normalised to upper snake case.
    pub extra: BTreeMap<String, String>,
}

impl StatusMarker {
    /// Parse `KEY=VALUE` or `Key: Value` lines. Blank lines and `#` comments
    /// are skipped; unrecognised keys are kept in `extra`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut marker = StatusMarker::default();
        let mut recognised = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = split_pair(line) else {
                continue;
            };
            recognised = true;
            let value = value.trim().trim_matches('"').to_string();

            match key.as_str() {
                k if TIMESTAMP_KEYS.contains(&k) => marker.completed_at = parse_timestamp(&value),
                k if SECRET_KEYS.contains(&k) => marker.db_secret = Some(value),
                "STATUS" => marker.status = Some(value),
                "DB_HOST" => marker.db_host = Some(value),
                "DB_NAME" => marker.db_name = Some(value),
                "DB_USER" => marker.db_user = Some(value),
                _ => {
                    marker.extra.insert(key.clone(), value);
                }
            }
        }

        if recognised {
            Ok(marker)
        } else {
            Err(ProbeError::EmptyMarker)
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProbeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text)
    }

    /// Installation finished: a completion timestamp, and no failure status.
    pub fn is_complete(&self) -> bool {
        let failed = self
            .status
            .as_deref()
            .is_some_and(|s| s.to_ascii_lowercase().contains("fail"));
        self.completed_at.is_some() && !failed
    }

    pub fn lines(&self) -> Vec<CheckLine> {
        let mut lines = Vec::new();
        match (self.is_complete(), self.completed_at) {
            (true, Some(at)) => lines.push(CheckLine::pass(format!(
                "installation completed at {}",
                at.to_rfc3339()
            ))),
            _ => lines.push(CheckLine::warn(format!(
                "installation not marked complete (status: {})",
                self.status.as_deref().unwrap_or("unknown")
            ))),
        }
        match &self.db_host {
            Some(host) => lines.push(CheckLine::pass(format!(
                "database host {} (db {}, user {})",
                host,
                self.db_name.as_deref().unwrap_or("?"),
                self.db_user.as_deref().unwrap_or("?")
            ))),
            None => lines.push(CheckLine::warn("database host not recorded")),
        }
        lines
    }
}

fn split_pair(line: &str) -> Option<(String, String)> {
    let (key, value) = match (line.find('='), line.find(':')) {
        (Some(eq), Some(colon)) if colon < eq => line.split_at(colon),
        (Some(eq), _) => line.split_at(eq),
        (None, Some(colon)) => line.split_at(colon),
        (None, None) => return None,
    };
    let key = normalise_key(key);
    if key.is_empty() {
        return None;
    }
    Some((key, value[1..].to_string()))
}

fn normalise_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// RFC 3339, or `%Y-%m-%d %H:%M:%S` taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// What the install log says about the bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogScan {
    pub completed: bool,
    pub errors: Vec<String>,
    pub last_line: Option<String>,
}

impl LogScan {
    pub fn lines(&self) -> Vec<CheckLine> {
        let mut lines = Vec::new();
        if self.completed {
            lines.push(CheckLine::pass("install log reports completion"));
        } else {
            lines.push(CheckLine::warn(format!(
                "install log has no completion line (last: {})",
                self.last_line.as_deref().unwrap_or("empty log")
            )));
        }
        for error in &self.errors {
            lines.push(CheckLine::fail(format!("install log: {}", error)));
        }
        lines
    }
}

/// Scan an install log for its completion line and error lines.
pub fn scan_install_log(text: &str) -> LogScan {
    let mut scan = LogScan::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_ascii_lowercase();
        if lower.contains("installation complete") || lower.contains("installation finished") {
            scan.completed = true;
        }
        if lower.contains("error") || lower.contains("failed") {
            scan.errors.push(line.to_string());
        }
        scan.last_line = Some(line.to_string());
    }
    scan
}

pub async fn load_install_log(path: &Path) -> Result<LogScan> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(scan_install_log(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_key_value_marker() {
        let text = "\
# written by user data
STATUS=completed
COMPLETED_AT=2024-05-01T10:15:00Z
DB_HOST=demo-db.abc.eu-west-1.rds.amazonaws.com
DB_NAME=matomo
DB_USER=matomo
DB_SECRET_ARN=arn:aws:secretsmanager:eu-west-1:123:secret:demo
PHP_VERSION=8.2
";
        let marker = StatusMarker::parse(text).unwrap();
        assert_eq!(
            marker.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap())
        );
        assert_eq!(marker.db_name.as_deref(), Some("matomo"));
        assert!(marker.db_secret.as_deref().unwrap().starts_with("arn:"));
        assert_eq!(marker.extra.get("PHP_VERSION").map(String::as_str), Some("8.2"));
        assert!(marker.is_complete());
    }

    #[test]
    fn test_parse_colon_marker_with_plain_timestamp() {
        let text = "Installation Completed: 2024-05-01 10:15:00\nDB Host: localhost\n";
        let marker = StatusMarker::parse(text).unwrap();
        assert_eq!(
            marker.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 0).unwrap())
        );
        assert_eq!(marker.db_host.as_deref(), Some("localhost"));
    }

    #[test]
    fn test_failed_status_is_not_complete() {
        let marker =
            StatusMarker::parse("STATUS=FAILED\nCOMPLETED_AT=2024-05-01T10:15:00Z\n").unwrap();
        assert!(!marker.is_complete());
        assert_eq!(marker.lines()[0].level, matomo_ops_core::CheckLevel::Warn);
    }

    #[test]
    fn test_empty_marker_is_an_error() {
        assert!(matches!(
            StatusMarker::parse("\n# nothing\n"),
            Err(ProbeError::EmptyMarker)
        ));
    }

    #[test]
    fn test_scan_install_log() {
        let log = "\
Installing packages
ERROR: could not reach mirror, retrying
Configuring Apache
Matomo installation complete
";
        let scan = scan_install_log(log);
        assert!(scan.completed);
        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.last_line.as_deref(), Some("Matomo installation complete"));
    }

    #[test]
    fn test_scan_unfinished_log() {
        let scan = scan_install_log("Installing packages\n");
        assert!(!scan.completed);
        assert!(scan.errors.is_empty());
    }
}
