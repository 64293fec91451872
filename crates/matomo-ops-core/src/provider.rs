//! The `StackProvider` seam.
//!
//! Every interaction with the cloud goes through this trait: status lookups,
//! bulk and per-stack destroys, output lookups and the lingering-resource
//! probe. The AWS CLI implementation lives in `matomo-ops-aws`; an in-memory
//! fake is provided in [`crate::fakes`].

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::stack::{LingeringResources, StackStatus};

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors reported by a stack provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A required CLI tool is missing.
    #[error("required tool `{0}` is not installed or not in PATH")]
    CommandNotFound(String),

    /// No usable cloud credentials.
    #[error("cloud credentials unavailable: {0}")]
    Credentials(String),

    /// A provider command ran but reported failure.
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A provider command exceeded its time budget.
    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// The stack does not exist.
    #[error("stack not found: {0}")]
    StackNotFound(String),

    /// Provider output could not be decoded.
    #[error("failed to parse output of `{command}`: {message}")]
    Parse { command: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether this error means the environment cannot run a teardown at all.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProviderError::CommandNotFound(_) | ProviderError::Credentials(_)
        )
    }
}

/// Cloud-side operations on the project's stacks.
#[async_trait]
pub trait StackProvider: Send + Sync {
    /// Verify that tooling and credentials are usable.
    async fn preflight(&self) -> ProviderResult<()>;

    /// Current status of a stack; `StackStatus::Absent` if it does not exist.
    async fn stack_status(&self, stack: &str) -> ProviderResult<StackStatus>;

    /// Stack outputs keyed by output name.
    async fn stack_outputs(&self, stack: &str) -> ProviderResult<BTreeMap<String, String>>;

    /// Destroy several stacks in one operation.
    async fn destroy_all(&self, stacks: &[String]) -> ProviderResult<()>;

    /// Destroy one stack and wait for the deletion to finish.
    async fn destroy_stack(&self, stack: &str) -> ProviderResult<()>;

    /// Instances and network interfaces still associated with the stack's network.
    async fn lingering_resources(&self, stack: &str) -> ProviderResult<LingeringResources>;
}
