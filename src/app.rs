//! # Application
//!
//! Wires configuration, database, document sources, predictor client and the
//! executor together, and implements the operations exposed by the CLI.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db;
use crate::executor::{AnalysisExecutor, RunOutcome};
use crate::models::{analysis_request, document, result};
use crate::pipeline::AnalysisPipeline;
use crate::predictor::{HttpPredictorClient, Predictor};
use crate::repositories::{
    AnalysisRequestRepository, AnalysisStore, DocumentRepository, ResultRepository, SeaOrmStore,
};
use crate::source::{DispatchingSource, DocumentSource, HttpDocumentSource, LocalFileSource};

/// A new analysis to register and run.
#[derive(Debug, Clone)]
pub struct AnalysisSubmission {
    /// Local path or `http(s)://` / `file://` URL of the recording
    pub location: String,
    pub input_voltage: f64,
    pub filename: Option<String>,
    pub comment: Option<String>,
}

/// Latest result for a request's document, or `pending` while none exists.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "result", rename_all = "snake_case")]
pub enum ResultState {
    Pending,
    Available(Box<result::Model>),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub request: analysis_request::Model,
    pub document: document::Model,
    pub analysis_count: u64,
    pub latest: ResultState,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub document: document::Model,
    pub analysis_count: u64,
    pub results: Vec<result::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryReport {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

pub struct App {
    documents: DocumentRepository,
    requests: AnalysisRequestRepository,
    results: ResultRepository,
    executor: AnalysisExecutor,
}

impl App {
    /// Connect, migrate and build the production wiring.
    pub async fn bootstrap(config: &AppConfig) -> Result<Self> {
        let db = db::connect_and_migrate(config).await?;

        let predictor = HttpPredictorClient::new(&config.predictor.base_url, config.predictor.timeout())
            .context("building predictor client")?;
        let http_source = HttpDocumentSource::new(config.document_fetch_timeout())
            .context("building HTTP document source")?;
        let source = DispatchingSource::new(
            LocalFileSource::new(config.document_root.clone()),
            http_source,
        );

        info!(
            predictor = %predictor.base_url(),
            concurrency = config.executor.concurrency,
            "Analysis service ready"
        );
        Ok(Self::with_components(
            db,
            config,
            Arc::new(source),
            Arc::new(predictor),
        ))
    }

    /// Build the application around an existing connection and collaborators.
    pub fn with_components(
        db: DatabaseConnection,
        config: &AppConfig,
        source: Arc<dyn DocumentSource>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        let processing_timeout = config.executor.max_run();
        let store: Arc<dyn AnalysisStore> =
            Arc::new(SeaOrmStore::new(db.clone()).with_processing_timeout(processing_timeout));
        let pipeline = Arc::new(AnalysisPipeline::new(
            store.clone(),
            source,
            predictor,
            config.calibration,
            config.analysis.reducer(),
        ));
        let executor = AnalysisExecutor::new(pipeline, store, &config.executor);

        Self {
            documents: DocumentRepository::new(db.clone()),
            requests: AnalysisRequestRepository::new(db.clone())
                .with_processing_timeout(processing_timeout),
            results: ResultRepository::new(db),
            executor,
        }
    }

    pub fn executor(&self) -> &AnalysisExecutor {
        &self.executor
    }

    /// Register the recording and request, run the analysis and report its status.
    pub async fn analyze(&self, submission: AnalysisSubmission) -> Result<(RunOutcome, StatusView)> {
        let location = normalize_location(&submission.location).await;
        let filename = submission
            .filename
            .clone()
            .unwrap_or_else(|| default_filename(&location));

        let document = self.documents.create(&location, &filename).await?;
        let request = self
            .requests
            .create(document.id, submission.input_voltage, submission.comment)
            .await?;

        let outcome = self
            .executor
            .submit(request.id)
            .await
            .context("analysis task panicked")?;

        let view = self.status(request.id).await?;
        Ok((outcome, view))
    }

    pub async fn status(&self, request_id: Uuid) -> Result<StatusView> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| anyhow!("analysis request {request_id} not found"))?;
        let document = self
            .documents
            .find_by_id(request.document_id)
            .await?
            .ok_or_else(|| anyhow!("document {} not found", request.document_id))?;
        let analysis_count = self.documents.analysis_count(document.id).await?;

        let latest = match self.results.latest_for_document(document.id).await? {
            Some(result) => ResultState::Available(Box::new(result)),
            None => ResultState::Pending,
        };

        Ok(StatusView {
            request,
            document,
            analysis_count,
            latest,
        })
    }

    /// Version history of a document, newest first.
    pub async fn history(&self, document_id: Uuid) -> Result<HistoryView> {
        let document = self
            .documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| anyhow!("document {document_id} not found"))?;
        let analysis_count = self.documents.analysis_count(document_id).await?;
        let results = self.results.history(document_id).await?;

        Ok(HistoryView {
            document,
            analysis_count,
            results,
        })
    }

    /// Re-run every retryable request and wait for all of them.
    pub async fn retry(&self) -> Result<Vec<RetryReport>> {
        let handles = self.executor.resubmit_retryable().await?;
        let mut reports = Vec::with_capacity(handles.len());
        for (request_id, handle) in handles {
            let outcome = handle.await.context("analysis task panicked")?;
            reports.push(RetryReport {
                request_id,
                outcome,
            });
        }
        Ok(reports)
    }

    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}

/// Absolute path for existing local files; anything else is kept as given.
async fn normalize_location(location: &str) -> String {
    match tokio::fs::canonicalize(location).await {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => location.to_string(),
    }
}

fn default_filename(location: &str) -> String {
    let trimmed = location.split(['?', '#']).next().unwrap_or(location);
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.to_string())
}
