//! Stack roles, naming and provider-reported status.
//!
//! A Matomo deployment is three CloudFormation stacks named after the
//! project: `{project}-networking`, `{project}-database` (optional) and
//! `{project}-compute`. Compute and database depend on networking, so the
//! teardown order is the reverse of the creation order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of a stack within the deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StackRole {
    /// VPC, subnets and security groups.
    Networking,

    /// RDS MySQL instance and its credentials secret.
    Database,

    /// EC2 instance, key pair and instance role.
    Compute,
}

impl StackRole {
    /// Order in which the stacks are deployed.
    pub const CREATION_ORDER: [StackRole; 3] =
        [StackRole::Networking, StackRole::Database, StackRole::Compute];

    /// Order in which the stacks must be destroyed.
    pub const TEARDOWN_ORDER: [StackRole; 3] =
        [StackRole::Compute, StackRole::Database, StackRole::Networking];

    /// Suffix appended to the project name.
    pub fn suffix(&self) -> &'static str {
        match self {
            StackRole::Networking => "networking",
            StackRole::Database => "database",
            StackRole::Compute => "compute",
        }
    }

    /// Full stack name for a project.
    pub fn stack_name(&self, project: &str) -> String {
        format!("{}-{}", project, self.suffix())
    }
}

impl fmt::Display for StackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A named stack belonging to a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackRef {
    pub role: StackRole,
    pub name: String,
}

impl StackRef {
    pub fn new(project: &str, role: StackRole) -> Self {
        Self {
            role,
            name: role.stack_name(project),
        }
    }
}

/// All expected stacks for a project, in creation order.
pub fn project_stacks(project: &str) -> Vec<StackRef> {
    StackRole::CREATION_ORDER
        .iter()
        .map(|role| StackRef::new(project, *role))
        .collect()
}

/// Stack status as reported by the orchestration engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// `CREATE_COMPLETE` / `IMPORT_COMPLETE`
    Created,

    /// `UPDATE_COMPLETE`
    Updated,

    /// `ROLLBACK_COMPLETE`, `UPDATE_ROLLBACK_COMPLETE`, ...
    RollbackComplete,

    /// Any `*_FAILED` status, including `DELETE_FAILED`.
    Failed,

    /// Any `*_IN_PROGRESS` status, including `DELETE_IN_PROGRESS`.
    InProgress,

    /// `DELETE_COMPLETE`, or the stack does not exist.
    Absent,
}

impl StackStatus {
    /// Whether the stack still exists from the provider's point of view.
    pub fn exists(&self) -> bool {
        !matches!(self, StackStatus::Absent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Created => "created",
            StackStatus::Updated => "updated",
            StackStatus::RollbackComplete => "rollback-complete",
            StackStatus::Failed => "failed",
            StackStatus::InProgress => "in-progress",
            StackStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised CloudFormation status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised stack status: {0}")]
pub struct UnknownStackStatus(pub String);

impl FromStr for StackStatus {
    type Err = UnknownStackStatus;

    /// Parse a CloudFormation `StackStatus` value.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let status = s.trim();
        let parsed = match status {
            "DELETE_COMPLETE" => StackStatus::Absent,
            "CREATE_COMPLETE" | "IMPORT_COMPLETE" => StackStatus::Created,
            "UPDATE_COMPLETE" => StackStatus::Updated,
            s if s.ends_with("_IN_PROGRESS") => StackStatus::InProgress,
            s if s.ends_with("ROLLBACK_COMPLETE") => StackStatus::RollbackComplete,
            s if s.ends_with("_FAILED") => StackStatus::Failed,
            other => return Err(UnknownStackStatus(other.to_string())),
        };
        Ok(parsed)
    }
}

/// Resources still attached to a stack's VPC after its deletion failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LingeringResources {
    /// VPC the probe inspected, if it could be resolved.
    pub vpc_id: Option<String>,

    /// EC2 instances not yet terminated.
    pub instance_ids: Vec<String>,

    /// Elastic network interfaces still present.
    pub network_interface_ids: Vec<String>,
}

impl LingeringResources {
    pub fn is_empty(&self) -> bool {
        self.instance_ids.is_empty() && self.network_interface_ids.is_empty()
    }

    /// All lingering resource ids, instances first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instance_ids
            .iter()
            .chain(self.network_interface_ids.iter())
            .map(String::as_str)
    }
}
