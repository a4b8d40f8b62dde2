//! Test utilities for database and fixture setup.
//!
//! Provides an in-memory SQLite database with all migrations applied and
//! helpers for writing CSV recordings to temporary directories.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use sea_orm::DatabaseConnection;
use transient_analysis::config::AppConfig;
use transient_analysis::db;
use transient_analysis::models::{analysis_request, document};
use transient_analysis::repositories::{AnalysisRequestRepository, DocumentRepository};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    db::connect_and_migrate(&test_config("http://127.0.0.1:9")).await
}

/// Configuration pointing at an in-memory database and the given predictor.
pub fn test_config(predictor_base_url: &str) -> AppConfig {
    let mut config = AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        ..AppConfig::default()
    };
    config.predictor.base_url = predictor_base_url.to_string();
    config.predictor.timeout_seconds = 2;
    config.executor.concurrency = 2;
    config.executor.max_run_seconds = 30;
    config
}

/// Configuration backed by a SQLite file in `dir`, with a multi-connection pool.
pub fn file_config(dir: &Path, predictor_base_url: &str) -> AppConfig {
    let mut config = test_config(predictor_base_url);
    config.database_url = format!("sqlite://{}?mode=rwc", dir.join("analysis.db").display());
    config.db_max_connections = 10;
    config
}

/// Sets up a migrated SQLite database file in `dir`.
pub async fn setup_file_db(dir: &Path) -> Result<DatabaseConnection> {
    db::connect_and_migrate(&file_config(dir, "http://127.0.0.1:9")).await
}

/// 200 samples at 1 ms: flat at 0 V until 20, a ramp to 5 V over 20..50, then 5 V.
pub fn step_response_csv() -> String {
    let mut csv = String::from("Time,Output\n");
    for i in 0..200 {
        let value = if i < 20 {
            0.0
        } else if i < 50 {
            (i - 20) as f64 * 5.0 / 30.0
        } else {
            5.0
        };
        let _ = writeln!(csv, "{},{}", i as f64 * 0.001, value);
    }
    csv
}

pub fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write csv fixture");
    path
}

/// Registers a document at `path` and submits one request for it.
pub async fn create_request(
    db: &DatabaseConnection,
    path: &Path,
    input_voltage: f64,
) -> Result<(document::Model, analysis_request::Model)> {
    let document = DocumentRepository::new(db.clone())
        .create(&path.to_string_lossy(), "step.csv")
        .await?;
    let request = AnalysisRequestRepository::new(db.clone())
        .create(document.id, input_voltage, None)
        .await?;
    Ok((document, request))
}
