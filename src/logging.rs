//! Logging configuration and initialization.
//!
//! `RUST_LOG`, when set, replaces the configured level entirely. Otherwise
//! the configured level applies to everything except per-query sqlx
//! events, which stay at `warn` unless the level is `trace`.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter directives for a configured level.
fn default_directives(level: Level) -> String {
    let base = level.as_str().to_lowercase();
    if level == Level::TRACE {
        base
    } else {
        format!("{base},sqlx::query=warn")
    }
}

/// Build the event filter, preferring `RUST_LOG` over the configured level.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(parse_level(level))))
}

/// Initialize the logging system with the given configuration.
///
/// Log lines go to stdout, colored if `ansi` is set, and to the configured
/// file without color codes.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_file = Arc::new(File::create(&config.file)?);

    tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(config.ansi)
                .with_target(true),
        )
        .with(
            fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    Ok(())
}

/// Initialize console-only logging (for development/testing).
pub fn init_console_only(level: &str, ansi: bool) {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(ansi)
                .with_target(true),
        )
        .init();
}
