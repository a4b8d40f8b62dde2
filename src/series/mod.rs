//! Time-series types shared by the analysis stages.
//!
//! A recording enters as a [`RawSeries`] (whatever the file contained), is
//! narrowed to a [`Window`] around the transient, and leaves as an
//! [`OptimizedSeries`] on a uniform time grid with a bounded point count.

use serde::{Deserialize, Serialize};

pub mod density;
pub mod ingest;
pub mod window;

pub use density::{DensityReducer, optimize};
pub use ingest::{ingest, ingest_bytes};
pub use window::{Window, detect_window, find_significant_change_start, find_stabilization_point};

/// Sampling period assumed when the recording neither declares nor implies one.
pub const DEFAULT_SAMPLING_PERIOD: f64 = 0.001;

/// A single `(time, value)` pair read from the recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub time: f64,
    pub value: f64,
}

/// Where the sampling period of a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSource {
    /// Declared by a `Sampling Period` metadata row.
    Explicit,
    /// Inferred from the spacing of the first two timestamps.
    Derived,
    /// Neither of the above; [`DEFAULT_SAMPLING_PERIOD`] is used.
    Default,
}

/// Metadata collected while ingesting a recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesMeta {
    /// Seconds between consecutive samples.
    pub sampling_period: f64,
    pub period_source: PeriodSource,
}

impl Default for SeriesMeta {
    fn default() -> Self {
        Self {
            sampling_period: DEFAULT_SAMPLING_PERIOD,
            period_source: PeriodSource::Default,
        }
    }
}

/// Samples in file order plus ingest metadata. Never empty once produced by [`ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub samples: Vec<RawSample>,
    pub meta: SeriesMeta,
}

impl RawSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.value).collect()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.time).collect()
    }
}

/// The windowed, re-based and downsampled series handed to feature
/// extraction, metrics and chart rendering.
///
/// Serialized as `{"time": [...], "output": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizedSeries {
    pub time: Vec<f64>,
    pub output: Vec<f64>,
}

impl OptimizedSeries {
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// First `(time, value)` pair, if any.
    pub fn first(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.output.first()?))
    }

    /// Last `(time, value)` pair, if any.
    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.time.last()?, *self.output.last()?))
    }
}
