//! Settings for talking to AWS through the CLI tools.

use std::path::PathBuf;
use std::time::Duration;

/// Connection and execution settings for [`crate::AwsCliProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// Region passed to every command; the CLI default applies when unset.
    pub region: Option<String>,

    /// Named credentials profile.
    pub profile: Option<String>,

    /// Directory holding the CDK app (`cdk.json`).
    pub project_dir: PathBuf,

    /// Time budget for describe and lookup commands.
    pub command_timeout: Duration,

    /// Time budget for destroy commands, which wait for deletion to finish.
    pub destroy_timeout: Duration,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            project_dir: PathBuf::from("."),
            command_timeout: Duration::from_secs(120),
            destroy_timeout: Duration::from_secs(45 * 60),
        }
    }
}

impl AwsConfig {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Flags selecting region and profile for the `aws` CLI.
    pub(crate) fn aws_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(region) = &self.region {
            flags.push("--region".to_string());
            flags.push(region.clone());
        }
        if let Some(profile) = &self.profile {
            flags.push("--profile".to_string());
            flags.push(profile.clone());
        }
        flags
    }

    /// Environment for the `cdk` CLI, which takes its region from the environment.
    pub(crate) fn cdk_env(&self) -> Vec<(String, String)> {
        match &self.region {
            Some(region) => vec![
                ("AWS_REGION".to_string(), region.clone()),
                ("AWS_DEFAULT_REGION".to_string(), region.clone()),
            ],
            None => Vec::new(),
        }
    }
}
