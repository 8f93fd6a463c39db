//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging long-running
//! submission workflows.
//!
//! All helpers here are redaction-safe: they accept identifiers and status
//! strings, never credential material. Credential types in this crate redact
//! their own `Debug` output, so secrets cannot leak through these fields.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Console output is always enabled; when `SHIPWAY_LOG_DIR` is set, a JSON
/// file layer is added alongside it. Safe to call more than once.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let file_layer = std::env::var("SHIPWAY_LOG_DIR").ok().map(|dir| {
            let log_dir = PathBuf::from(dir);
            if !log_dir.exists() {
                // Fall through on failure; the console layer still works.
                let _ = fs::create_dir_all(&log_dir);
            }
            let file_appender = tracing_appender::rolling::never(
                &log_dir,
                format!("shipway.{}.{}.log", environment, std::process::id()),
            );
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // The guard must outlive the process for buffered writes to flush.
            std::mem::forget(guard);
            fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(log_level.clone()))
        });

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        // Another subscriber may already be installed by the host process.
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }
    });
}

fn get_environment() -> String {
    std::env::var("SHIPWAY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for job lifecycle operations, keyed by progress code.
pub fn log_job_operation(
    code: &str,
    job_id: Option<&str>,
    job_type: Option<&str>,
    platform: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        code = %code,
        job_id = job_id,
        job_type = job_type,
        platform = platform,
        status = %status,
        details = details,
        "📦 JOB_OPERATION"
    );
}

/// Log structured data for adapter capability calls.
pub fn log_adapter_operation(
    adapter: &str,
    operation: &str,
    bundle_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        adapter = %adapter,
        operation = %operation,
        bundle_id = bundle_id,
        status = %status,
        details = details,
        "🛰 ADAPTER_OPERATION"
    );
}

/// Log an error with full context.
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "❌ ERROR"
    );
}
