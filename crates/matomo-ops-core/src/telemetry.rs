//! Tracing initialisation for the `matomo-ops` binary.
//!
//! Log lines go to stderr so that reports and JSON printed on stdout stay
//! machine-readable. Without `RUST_LOG`, the workspace crates log at the
//! requested level and dependencies (reqwest, hyper) only at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log targets of the binary and its library crates.
const OPS_TARGETS: &[&str] = &[
    "matomo_ops",
    "matomo_ops_core",
    "matomo_ops_aws",
    "matomo_ops_probe",
];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec![Level::WARN.as_str().to_ascii_lowercase()];
    directives.extend(
        OPS_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str().to_ascii_lowercase())),
    );
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// `json` switches to newline-delimited JSON for log shippers. Only the first
/// call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_ops_crates() {
        let directives = default_directives(Level::DEBUG);
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("matomo_ops_core=debug"));
        assert!(directives.contains("matomo_ops_probe=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
