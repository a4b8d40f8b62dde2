//! Telemetry: global tracing subscriber and metric descriptions.
//!
//! Log output goes to stderr so command output on stdout stays machine readable.

use std::any::type_name_of_val;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use metrics::{Unit, describe_counter, describe_histogram};
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

pub const ANALYSIS_RUNS_TOTAL: &str = "analysis_runs_total";
pub const PREDICTOR_FALLBACK_TOTAL: &str = "predictor_fallback_total";
pub const ANALYSIS_DURATION_SECONDS: &str = "analysis_duration_seconds";

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize global tracing/logging exactly once, wiring `log::` macros into the tracing pipeline.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    // sea-orm and sqlx log through `log::`.
    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "Warning: Failed to install log tracer bridge: {}. `log::` records from the database layer will be dropped.",
                err
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().with_writer(io::stderr).boxed(),
        _ => fmt::layer().json().with_writer(io::stderr).boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!(
            "Warning: Failed to set global tracing subscriber: {}. Default subscriber remains in effect.",
            err
        );
    }

    describe_metrics();
    Ok(())
}

/// Register descriptions for the metrics emitted by the executor and pipeline.
pub fn describe_metrics() {
    describe_counter!(
        ANALYSIS_RUNS_TOTAL,
        Unit::Count,
        "Analysis runs by outcome (completed, failed, cancelled, skipped)"
    );
    describe_counter!(
        PREDICTOR_FALLBACK_TOTAL,
        Unit::Count,
        "Predictor calls replaced by fallback values, by call"
    );
    describe_histogram!(
        ANALYSIS_DURATION_SECONDS,
        Unit::Seconds,
        "Wall-clock duration of analysis runs"
    );
}
