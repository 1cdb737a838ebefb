//! Structured logging (SPEC_FULL.md "AMBIENT STACK"): a single process-wide
//! `tracing` subscriber installed once at startup, gated by the `logging`
//! config section and `FINFOCUS_LOG_LEVEL`. Mirrors the teacher's
//! `observability::tracing::init_tracing`/`init_tracing_json` pair, merged
//! into one entry point that branches on the config's `json` flag instead
//! of exposing two free functions.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

static INSTALLED: AtomicBool = AtomicBool::new(false);

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber. Safe to call more than once in the same
/// process — later calls are a no-op — since `tracing`'s global dispatcher
/// can only be set once; tests needing a fresh subscriber use
/// `reset_for_tests` first (spec.md §5 "Global singletons... re-settable
/// only via explicit reset entry points used by tests").
pub fn init(config: &LoggingConfig) {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let filter = env_filter(&config.level);
    if config.json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}

/// Resolve the effective logging config: `FINFOCUS_LOG_LEVEL` overrides the
/// config section's level (spec.md §6 "Environment variables"); an absent
/// section falls back to the documented defaults.
pub fn init_from_env(config: Option<&LoggingConfig>) {
    let mut resolved = config.cloned().unwrap_or(LoggingConfig {
        level: "info".to_string(),
        json: false,
    });
    if let Ok(level) = std::env::var("FINFOCUS_LOG_LEVEL") {
        resolved.level = level;
    }
    init(&resolved);
}

/// Test-only reset of the installed-once guard. Does not un-set `tracing`'s
/// global dispatcher (that is a genuine one-shot), only lets `init` attempt
/// another `try_init` in an isolated test process (spec.md §5 "a public
/// reset entry point is provided for tests").
#[cfg(test)]
pub(crate) fn reset_for_tests() {
    INSTALLED.store(false, Ordering::SeqCst);
}
