//! Logging system configuration and initialization
//!
//! Console and optional file output driven by `LoggingConfig`. The
//! non-blocking file writer's guard must stay alive for the process
//! lifetime, so it is parked in a global.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::infrastructure::config::LoggingConfig;

// Keeps the log file writers alive.
static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Get the log directory relative to the executable location.
pub fn default_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system from configuration. `RUST_LOG` overrides
/// the configured levels when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config)?;

    let console_plain =
        (config.console_output && !config.json_format).then(|| fmt::layer().with_target(true));
    let console_json =
        (config.console_output && config.json_format).then(|| fmt::layer().json());

    let file_layer = if config.file_output {
        let log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(default_log_directory);
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log dir: {}", log_dir.display()))?;

        let appender = rolling::daily(&log_dir, "lapcat.log");
        let (writer, guard) = non_blocking(appender);
        LOG_GUARDS
            .lock()
            .expect("log guard mutex poisoned")
            .push(guard);

        Some(fmt::layer().with_writer(writer).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_plain)
        .with(console_json)
        .with(file_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::try_from_default_env().context("invalid RUST_LOG filter");
    }

    let mut directives = config.level.clone();
    for (module, level) in &config.module_filters {
        directives.push_str(&format!(",{module}={level}"));
    }

    EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter directives: {directives}"))
}
