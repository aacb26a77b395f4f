//! Structured logging for hollow.
//!
//! Console output with uptime timestamps and module paths, plus JSON file
//! logging in debug builds. The config's `log_level` provides the default
//! filter; `RUST_LOG` takes precedence when set.

use std::path::Path;

use hollow_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config specify a level.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "hollow.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables file logging
/// * `config` - optional config whose `debug.log_level` sets the filter
///
/// Calling this twice panics inside `tracing-subscriber`; use
/// [`try_init_logging`] where that matters (tests).
///
/// ```no_run
/// use hollow_log::init_logging;
///
/// init_logging(None, false, None);
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console_layer());

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Console-only initialization that returns `false` instead of panicking when
/// a global subscriber is already installed.
pub fn try_init_logging(config: Option<&Config>) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console_layer())
        .try_init()
        .is_ok()
}

/// Builds the filter: `RUST_LOG` if set, else the config level, else [`DEFAULT_FILTER`].
pub fn env_filter(config: Option<&Config>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_string(config)))
}

/// The filter directive derived from the config alone.
pub fn filter_string(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        // worker threads are named per region shard
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime())
}
