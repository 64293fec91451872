//! Project and teardown configuration.
//!
//! The project name and feature switches live in the CDK app's `cdk.json`
//! under `context.matomo`. Everything the teardown needs is carried in an
//! explicit [`TeardownConfig`] rather than read from the process environment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cleanup::LocalArtifacts;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::stack::{project_stacks, StackRef};

/// Name of the CDK project file holding the deployment context.
pub const PROJECT_CONFIG_FILE: &str = "cdk.json";

/// Project name used when the context does not set one.
pub const DEFAULT_PROJECT_NAME: &str = "matomo-analytics";

/// Networking options from the CDK context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkingSettings {
    #[serde(default = "default_vpc_cidr")]
    pub vpc_cidr: String,

    #[serde(default = "default_true")]
    pub single_nat_gateway: bool,
}

impl Default for NetworkingSettings {
    fn default() -> Self {
        Self {
            vpc_cidr: default_vpc_cidr(),
            single_nat_gateway: true,
        }
    }
}

/// RDS options from the CDK context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSettings {
    #[serde(default = "default_allocated_storage")]
    pub allocated_storage: u32,

    #[serde(default, rename = "multiAZ")]
    pub multi_az: bool,

    #[serde(default)]
    pub backup_retention: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            allocated_storage: default_allocated_storage(),
            multi_az: false,
            backup_retention: 0,
        }
    }
}

/// The `context.matomo` object of `cdk.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,

    #[serde(default)]
    pub enable_database: bool,

    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_ssh_cidr")]
    pub allowed_ssh_cidr: String,

    #[serde(default)]
    pub networking: NetworkingSettings,

    #[serde(default)]
    pub database_config: DatabaseSettings,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            enable_database: false,
            instance_type: default_instance_type(),
            allowed_ssh_cidr: default_ssh_cidr(),
            networking: NetworkingSettings::default(),
            database_config: DatabaseSettings::default(),
        }
    }
}

#[derive(Deserialize)]
struct CdkFile {
    #[serde(default)]
    context: CdkContext,
}

#[derive(Default, Deserialize)]
struct CdkContext {
    #[serde(default)]
    matomo: Option<ProjectConfig>,
}

impl ProjectConfig {
    /// Load `cdk.json` from a project directory.
    ///
    /// A missing file is a precondition failure; a file without a
    /// `context.matomo` section yields the defaults.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = project_dir.join(PROJECT_CONFIG_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path))
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        let config = Self::from_cdk_json(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        validate_project_name(&config.project_name)?;
        Ok(config)
    }

    /// Parse the `context.matomo` section of a `cdk.json` document.
    pub fn from_cdk_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: CdkFile = serde_json::from_str(text)?;
        Ok(file.context.matomo.unwrap_or_default())
    }

    /// Stacks this configuration deploys, in creation order.
    pub fn deployed_stacks(&self) -> Vec<StackRef> {
        project_stacks(&self.project_name)
            .into_iter()
            .filter(|s| self.enable_database || s.role != crate::stack::StackRole::Database)
            .collect()
    }
}

/// Check that a project name yields valid CloudFormation stack names.
pub fn validate_project_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        _ => false,
    };
    // Longest suffix is "-networking"; CloudFormation allows 128 characters.
    if valid && name.len() + "-networking".len() <= 128 {
        Ok(())
    } else {
        Err(ConfigError::InvalidProjectName(name.to_string()))
    }
}

/// Everything the teardown sequencer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownConfig {
    pub project_name: String,

    /// Skip the interactive confirmation.
    pub force: bool,

    /// Retry policy for the networking stack in the per-stack fallback.
    pub networking_retry: RetryPolicy,

    /// Existence polling after the destroy attempts.
    pub verification: RetryPolicy,

    /// Local files removed at the end of every confirmed run.
    pub local_artifacts: LocalArtifacts,
}

impl TeardownConfig {
    /// Default teardown settings for a project rooted at `project_dir`.
    pub fn new(project_name: impl Into<String>, project_dir: &Path) -> Self {
        Self {
            project_name: project_name.into(),
            force: false,
            networking_retry: RetryPolicy::networking_teardown(),
            verification: RetryPolicy::deletion_verification(),
            local_artifacts: LocalArtifacts::for_project_dir(project_dir),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_local_artifacts(mut self, artifacts: LocalArtifacts) -> Self {
        self.local_artifacts = artifacts;
        self
    }

    /// The three stack names, in creation order.
    pub fn stacks(&self) -> Vec<StackRef> {
        project_stacks(&self.project_name)
    }
}

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

fn default_instance_type() -> String {
    "t3.micro".to_string()
}

fn default_ssh_cidr() -> String {
    "0.0.0.0/0".to_string()
}

fn default_vpc_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_allocated_storage() -> u32 {
    20
}

fn default_true() -> bool {
    true
}
