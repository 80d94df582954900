//! Tracing setup shared by every `greenroom` subcommand.
//!
//! `RUST_LOG` wins when set. Otherwise the configured `logging.level`
//! applies to this crate and to the HTTP request traces of `tower_http`,
//! while third-party crates stay at `warn`.

use tracing_subscriber::EnvFilter;

const CRATE_TARGETS: [&str; 2] = ["greenroom", "tower_http"];

/// Maps a configured level name onto a tracing directive level.
///
/// Unknown names fall back to `info`.
pub fn level_name(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    let level = level_name(level);
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// `RUST_LOG` if it parses, the configured level otherwise.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Installs the global fmt subscriber.
///
/// Later calls are no-ops, so tests and the CLI can both call it.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(true)
        .try_init();
}
