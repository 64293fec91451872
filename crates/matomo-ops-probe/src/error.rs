//! Error types for matomo-ops-probe

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up or running probes.
///
/// An unreachable site is not an error: it is an observation that
/// classifies as a failure.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// URL could not be parsed or has no host
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Local file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Status marker has no recognisable content
    #[error("status marker is empty or unrecognised")]
    EmptyMarker,
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        ProbeError::Client(err.to_string())
    }
}

/// Result type for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;
