//! # Analysis Pipeline
//!
//! One analysis run: fetch the recording, ingest it, window and reduce it,
//! ask the predictor for a class and poles (falling back on failure),
//! calibrate, measure, describe and persist a new result version.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::calibration::{CalibrationTable, ResolvedPoles};
use crate::error::{AnalysisError, RepositoryError};
use crate::features::extract_features;
use crate::models::result;
use crate::performance::PerformanceMetrics;
use crate::predictor::{Predictor, SystemType};
use crate::report::{self, PredictionRecord, RawMetrics, TechnicalSummary};
use crate::repositories::{AnalysisStore, NewResult};
use crate::series::{self, DensityReducer, OptimizedSeries, RawSeries, Window};
use crate::source::DocumentSource;
use crate::telemetry::PREDICTOR_FALLBACK_TOTAL;

/// Everything computed for one recording, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub window: Window,
    pub optimized: OptimizedSeries,
    pub system_type: SystemType,
    pub poles: ResolvedPoles,
    pub metrics: PerformanceMetrics,
    pub prediction: PredictionRecord,
    pub description: String,
    pub summary: TechnicalSummary,
    pub raw_metrics: RawMetrics,
}

impl AnalysisOutcome {
    /// Serializes the outcome into the row written for `request_id`.
    pub fn to_new_result(&self, request_id: Uuid) -> Result<NewResult, serde_json::Error> {
        let ml_poles = self.prediction.poles.map(|pair| pair.as_array());
        Ok(NewResult {
            analysis_request_id: request_id,
            system_type: self.system_type,
            description: self.description.clone(),
            poles: report::poles_json(&self.poles)?,
            raw_metrics: serde_json::to_value(&self.raw_metrics)?,
            optimized_series: serde_json::to_value(&self.optimized)?,
            technical_summary: serde_json::to_value(&self.summary)?,
            ml_predicted_type: self.prediction.predicted_type,
            ml_pole1_real: ml_poles.map(|[s1, _]| s1.real),
            ml_pole1_imag: ml_poles.map(|[s1, _]| s1.imag),
            ml_pole2_real: ml_poles.map(|[_, s2]| s2.real),
            ml_pole2_imag: ml_poles.map(|[_, s2]| s2.imag),
            ml_confidence: self.prediction.confidence,
        })
    }
}

pub struct AnalysisPipeline {
    store: Arc<dyn AnalysisStore>,
    source: Arc<dyn DocumentSource>,
    predictor: Arc<dyn Predictor>,
    calibration: CalibrationTable,
    reducer: DensityReducer,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        source: Arc<dyn DocumentSource>,
        predictor: Arc<dyn Predictor>,
        calibration: CalibrationTable,
        reducer: DensityReducer,
    ) -> Self {
        Self {
            store,
            source,
            predictor,
            calibration,
            reducer,
        }
    }

    /// Runs the analysis of one request and commits its result.
    ///
    /// Status bookkeeping for failures is left to the caller.
    #[instrument(skip_all, fields(request_id = %request_id))]
    pub async fn run(&self, request_id: Uuid) -> Result<result::Model, AnalysisError> {
        let job = match self.store.load_job(request_id).await {
            Ok(job) => job,
            Err(RepositoryError::NotFound(_)) => {
                return Err(AnalysisError::RequestNotFound(request_id));
            }
            Err(err) => return Err(err.into()),
        };

        if job.document.is_deleted {
            return Err(AnalysisError::DocumentDeleted(job.document.id));
        }

        let bytes = self.source.fetch(&job.document.file_path).await?;
        let series = series::ingest_bytes(&bytes)?;

        info!(
            document_id = %job.document.id,
            samples = series.len(),
            sampling_period = series.meta.sampling_period,
            "Recording ingested"
        );

        let outcome = self.analyze(&series, job.request.input_voltage).await;
        let new_result = outcome.to_new_result(job.request.id)?;
        let stored = self.store.write_result(new_result).await?;

        info!(
            result_id = %stored.id,
            version = stored.version,
            system_type = stored.system_type.as_str(),
            "Analysis completed"
        );
        Ok(stored)
    }

    /// Analyzes a non-empty series. Predictor failures never abort the analysis.
    pub async fn analyze(&self, series: &RawSeries, input_voltage: f64) -> AnalysisOutcome {
        let (window, optimized) = series::optimize(series, input_voltage, &self.reducer);

        debug!(
            original = series.len(),
            optimized = optimized.len(),
            "Series reduced"
        );

        let (system_type, poles, prediction) = self.predict(&optimized, input_voltage).await;

        let metrics = PerformanceMetrics::compute(&optimized, input_voltage);
        let description = report::describe(system_type, poles.pair(), &metrics, input_voltage);
        let summary = TechnicalSummary::new(poles.pair(), &metrics, series.len(), optimized.len());
        let raw_metrics = RawMetrics::new(
            input_voltage,
            series.len(),
            &series.meta,
            &optimized,
            metrics,
            &prediction,
        );

        AnalysisOutcome {
            window,
            optimized,
            system_type,
            poles,
            metrics,
            prediction,
            description,
            summary,
            raw_metrics,
        }
    }

    async fn predict(
        &self,
        optimized: &OptimizedSeries,
        input_voltage: f64,
    ) -> (SystemType, ResolvedPoles, PredictionRecord) {
        let mut system_type = SystemType::default();
        let mut prediction = PredictionRecord::default();

        let features = match extract_features(optimized, input_voltage) {
            Ok(features) => features,
            Err(err) => {
                warn!(error = %err, "Skipping prediction");
                return (system_type, ResolvedPoles::fallback(), prediction);
            }
        };

        match self.predictor.classify(&features).await {
            Ok(classification) => {
                system_type = classification.system_type;
                prediction.predicted_type = Some(classification.code);
                prediction.confidence = classification.confidence;
            }
            Err(err) => {
                warn!(error = %err, fallback = system_type.as_str(), "Classification unavailable");
                counter!(PREDICTOR_FALLBACK_TOTAL, "call" => "classify").increment(1);
            }
        }

        let poles = match self.predictor.poles(&features).await {
            Ok(raw) => {
                let resolved = self.calibration.resolve(system_type, raw);
                prediction.poles = Some(*resolved.pair());
                resolved
            }
            Err(err) => {
                warn!(error = %err, "Pole estimation unavailable, using fallback poles");
                counter!(PREDICTOR_FALLBACK_TOTAL, "call" => "poles").increment(1);
                ResolvedPoles::fallback()
            }
        };

        (system_type, poles, prediction)
    }
}
