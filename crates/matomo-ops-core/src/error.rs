//! Error taxonomy for the teardown procedure.
//!
//! Only precondition failures surface as `Err`. Everything that happens after
//! the operator has confirmed (failed destroys, lingering resources, slow
//! deletion) is recorded in the `TeardownReport` instead.

use std::path::PathBuf;

use crate::provider::ProviderError;

/// Errors loading or validating the project configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("project config not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read project config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid project name {0:?}: must start with a letter and contain only letters, digits and hyphens")]
    InvalidProjectName(String),
}

/// Fatal teardown errors.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("precondition failed: {0}")]
    Precondition(ProviderError),

    #[error("failed to read confirmation: {0}")]
    Confirmation(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for teardown operations.
pub type Result<T> = std::result::Result<T, TeardownError>;
