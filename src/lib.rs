//! # Transient Analysis Library
//!
//! Step-response analysis of recorded transients: ingestion, windowing,
//! density reduction, feature extraction, predictor-backed classification
//! with fallback, pole calibration, performance metrics, descriptions and
//! versioned result persistence.

pub mod app;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod features;
pub mod models;
pub mod performance;
pub mod pipeline;
pub mod predictor;
pub mod report;
pub mod repositories;
pub mod series;
pub mod source;
pub mod telemetry;
pub use migration;
