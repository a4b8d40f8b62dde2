//! Tabular recording ingestion.
//!
//! Recordings are comma-separated rows with at least two cells. Within the
//! first ten rows a `Sampling Period, <seconds>` metadata row may appear, and a
//! header row naming the time/output columns may precede the data. Every other
//! row whose first two cells are finite numbers becomes a sample; anything else
//! is skipped.

use std::io::Read;

use tracing::{debug, warn};

use super::{DEFAULT_SAMPLING_PERIOD, PeriodSource, RawSample, RawSeries, SeriesMeta};
use crate::error::AnalysisError;

/// Metadata rows are only honoured this close to the top of the file.
const METADATA_SCAN_ROWS: usize = 10;

/// Derived periods at or above this are treated as bogus timestamps.
const MAX_DERIVED_PERIOD: f64 = 1.0;

const METADATA_LABEL: &str = "sampling period";
const TIME_HEADERS: [&str; 2] = ["time", "tiempo"];
const OUTPUT_HEADERS: [&str; 2] = ["output", "salida"];

/// Parses a recording held in memory.
pub fn ingest_bytes(bytes: &[u8]) -> Result<RawSeries, AnalysisError> {
    ingest(bytes)
}

/// Parses a recording from any reader.
///
/// Returns [`AnalysisError::EmptyDataset`] when no row yields a numeric pair.
pub fn ingest<R: Read>(reader: R) -> Result<RawSeries, AnalysisError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    let mut explicit_period = None;
    let mut data_started = false;

    for (index, record) in csv_reader.records().enumerate() {
        let row_number = index + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(row = row_number, error = %err, "Skipping unreadable row");
                continue;
            }
        };

        let (Some(first), Some(second)) = (record.get(0), record.get(1)) else {
            continue;
        };

        if row_number <= METADATA_SCAN_ROWS && first.to_lowercase().contains(METADATA_LABEL) {
            match second.parse::<f64>() {
                Ok(period) if period.is_finite() && period > 0.0 => {
                    debug!(row = row_number, period, "Sampling period declared");
                    explicit_period = Some(period);
                }
                _ => warn!(row = row_number, value = second, "Ignoring invalid sampling period"),
            }
            continue;
        }

        if !data_started && is_header_row(first, second) {
            debug!(row = row_number, "Skipping header row");
            continue;
        }

        match (parse_finite(first), parse_finite(second)) {
            (Some(time), Some(value)) => {
                samples.push(RawSample { time, value });
                data_started = true;
            }
            _ => debug!(row = row_number, "Skipping non-numeric row"),
        }
    }

    if samples.is_empty() {
        return Err(AnalysisError::EmptyDataset);
    }

    let meta = resolve_meta(explicit_period, &samples);
    debug!(
        samples = samples.len(),
        sampling_period = meta.sampling_period,
        source = ?meta.period_source,
        "Recording ingested"
    );

    Ok(RawSeries { samples, meta })
}

fn resolve_meta(explicit_period: Option<f64>, samples: &[RawSample]) -> SeriesMeta {
    if let Some(period) = explicit_period {
        return SeriesMeta {
            sampling_period: period,
            period_source: PeriodSource::Explicit,
        };
    }

    if let [first, second, ..] = samples {
        let delta = (second.time - first.time).abs();
        if delta > 0.0 && delta < MAX_DERIVED_PERIOD {
            return SeriesMeta {
                sampling_period: delta,
                period_source: PeriodSource::Derived,
            };
        }
    }

    SeriesMeta {
        sampling_period: DEFAULT_SAMPLING_PERIOD,
        period_source: PeriodSource::Default,
    }
}

fn is_header_row(first: &str, second: &str) -> bool {
    let first = first.to_lowercase();
    let second = second.to_lowercase();
    TIME_HEADERS.iter().any(|label| first.contains(label))
        || OUTPUT_HEADERS.iter().any(|label| second.contains(label))
}

fn parse_finite(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}
