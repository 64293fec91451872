//! Pass / warn / fail status lines and their summary count.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a status line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    Pass,
    Warn,
    Fail,
}

impl CheckLevel {
    pub fn label(&self) -> &'static str {
        match self {
            CheckLevel::Pass => "PASS",
            CheckLevel::Warn => "WARN",
            CheckLevel::Fail => "FAIL",
        }
    }
}

/// One line of user-visible status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLine {
    pub level: CheckLevel,
    pub message: String,
}

impl CheckLine {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            level: CheckLevel::Pass,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: CheckLevel::Warn,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            level: CheckLevel::Fail,
            message: message.into(),
        }
    }
}

impl fmt::Display for CheckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.label(), self.message)
    }
}

/// Count of lines per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
}

impl CheckSummary {
    pub fn from_lines(lines: &[CheckLine]) -> Self {
        let mut summary = Self::default();
        for line in lines {
            match line.level {
                CheckLevel::Pass => summary.passed += 1,
                CheckLevel::Warn => summary.warned += 1,
                CheckLevel::Fail => summary.failed += 1,
            }
        }
        summary
    }

    /// Worst level present, if any.
    pub fn worst(&self) -> Option<CheckLevel> {
        if self.failed > 0 {
            Some(CheckLevel::Fail)
        } else if self.warned > 0 {
            Some(CheckLevel::Warn)
        } else if self.passed > 0 {
            Some(CheckLevel::Pass)
        } else {
            None
        }
    }
}

impl fmt::Display for CheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} warnings, {} failed",
            self.passed, self.warned, self.failed
        )
    }
}
