//! Logging configuration for fusionrag

use std::path::Path;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::LoggingConfig;
use crate::Result;

const LOGS_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "fusionrag.log";
const BACKTRACE_ENV: &str = "RUST_LIB_BACKTRACE";

/// Initialize logging system with file output
pub fn init_logging() -> Result<()> {
    init_logging_with_config(None)
}

/// Initialize logging with configuration
pub fn init_logging_with_config(config: Option<&crate::config::AppConfig>) -> Result<()> {
    match config {
        Some(config) => init_logging_with_level(&config.logging.level),
        None => {
            // Fallback to environment variable or default
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fusionrag=debug"));
            init_registry(env_filter, "info")
        }
    }
}

/// Initialize logging with custom log level
pub fn init_logging_with_level(level: &str) -> Result<()> {
    let env_filter = EnvFilter::new(format!("{level},fusionrag={level}"));
    init_registry(env_filter, level)
}

fn init_registry(env_filter: EnvFilter, level: &str) -> Result<()> {
    let logs_dir = Path::new(LOGS_DIR);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let file_appender = tracing_appender::rolling::daily(LOGS_DIR, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false); // No colors in file

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized with level: {level} - console and file output enabled");
    tracing::debug!("Log files will be saved to: {LOGS_DIR}/{LOG_FILE_PREFIX}.YYYY-MM-DD");

    // The writer thread must outlive main
    std::mem::forget(guard);

    Ok(())
}

/// Enable error backtraces when `logging.backtrace` is set
///
/// An explicit `RUST_LIB_BACKTRACE` in the environment wins. Returns whether
/// backtraces end up enabled by the configuration.
pub fn configure_backtrace(config: &LoggingConfig) -> bool {
    if !config.backtrace {
        return false;
    }
    if std::env::var_os(BACKTRACE_ENV).is_none() {
        std::env::set_var(BACKTRACE_ENV, "1");
    }
    std::env::var_os(BACKTRACE_ENV).is_some_and(|value| value != "0")
}

/// Initialize simple logging for testing
pub fn init_simple_logging() -> Result<()> {
    // Ignore the error when a subscriber is already installed by another test
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();

    Ok(())
}
