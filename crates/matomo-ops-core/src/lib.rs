//! Matomo Ops Core Library
//!
//! Domain model and sequencing logic for operating the three Matomo CDK
//! stacks (`networking`, `database`, `compute`):
//!
//! - `stack`: stack roles, naming and provider-reported status
//! - `provider`: the `StackProvider` seam every cloud call goes through
//! - `retry`: bounded retry / polling policy
//! - `teardown`: the staged teardown sequencer
//! - `cleanup`: best-effort removal of local working files
//! - `fakes`: in-memory provider and confirmation for tests

pub mod cleanup;
pub mod config;
pub mod confirm;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod provider;
pub mod report;
pub mod retry;
pub mod stack;
pub mod teardown;
pub mod telemetry;

pub use cleanup::{cleanup_local_artifacts, CleanupFailure, CleanupReport, LocalArtifacts};
pub use config::{
    validate_project_name, DatabaseSettings, NetworkingSettings, ProjectConfig, TeardownConfig,
    DEFAULT_PROJECT_NAME, PROJECT_CONFIG_FILE,
};
pub use confirm::{is_confirmed, Confirm, StdinConfirm, CONFIRMATION_TOKEN};
pub use error::{ConfigError, Result, TeardownError};
pub use provider::{ProviderError, ProviderResult, StackProvider};
pub use report::{CheckLevel, CheckLine, CheckSummary};
pub use retry::{Retried, RetryPolicy};
pub use stack::{project_stacks, LingeringResources, StackRef, StackRole, StackStatus};
pub use teardown::{DestroyAttempt, DestroyPath, TeardownReport, TeardownSequencer};
pub use telemetry::init_tracing;

/// Matomo Ops version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
