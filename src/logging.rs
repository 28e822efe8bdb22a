//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to the console and, when the
//! log directory is writable, to a JSON log file for debugging concurrent task
//! execution. The directory is `log/` unless `TASKER_LOG_DIR` says otherwise; the
//! `test` environment writes no file unless `TASKER_LOG_DIR` is set.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::detect_environment;
use crate::constants;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; an already-installed global subscriber is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(build_filter(&log_level));

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");

        // Unit tests never write into the crate directory
        let log_dir = if cfg!(test) {
            None
        } else {
            resolve_log_directory(
                &environment,
                std::env::var(constants::logging::LOG_DIR_ENV_VAR).ok(),
            )
        };

        let file_layer = match log_dir.as_ref().map(|dir| (dir, fs::create_dir_all(dir))) {
            Some((log_dir, Ok(()))) => {
                let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);
                let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                // The writer flushes on guard drop; keep it for the process lifetime.
                std::mem::forget(guard);
                Some(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(build_filter(&log_level)),
                )
            }
            _ => None,
        };
        let has_file_output = file_layer.is_some();
        let log_file = log_dir.map(|dir| dir.join(&log_filename));

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            file_output = has_file_output,
            log_file = ?log_file,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Directory for the JSON log file, if any. An explicit directory always wins; otherwise
/// the `test` environment logs to the console only.
fn resolve_log_directory(environment: &str, configured: Option<String>) -> Option<PathBuf> {
    match configured {
        Some(dir) if !dir.trim().is_empty() => Some(PathBuf::from(dir)),
        _ if environment == "test" => None,
        _ => Some(PathBuf::from(constants::logging::DEFAULT_LOG_DIR)),
    }
}

/// `RUST_LOG` wins over the environment default
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for task operations
pub fn log_task_operation(
    operation: &str,
    task_id: &str,
    status: &str,
    attempts: Option<u32>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        status = %status,
        attempts = attempts,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
