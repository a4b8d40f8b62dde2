//! # Analysis Store
//!
//! The persistence seam used by the pipeline and executor. [`SeaOrmStore`]
//! composes the entity repositories over one connection pool.

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use super::{AnalysisRequestRepository, DocumentRepository, NewResult, ResultRepository};
use crate::error::RepositoryError;
use crate::models::{analysis_request, document, result};

/// A request together with the document it analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisJob {
    pub request: analysis_request::Model,
    pub document: document::Model,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Load a request and its document; `NotFound` if either is missing.
    async fn load_job(&self, request_id: Uuid) -> Result<AnalysisJob, RepositoryError>;

    /// Move a request to `processing`; false if it is not claimable.
    async fn claim(&self, request_id: Uuid) -> Result<bool, RepositoryError>;

    async fn mark_failed(&self, request_id: Uuid, message: &str) -> Result<(), RepositoryError>;

    async fn release(&self, request_id: Uuid) -> Result<(), RepositoryError>;

    async fn retryable_requests(&self) -> Result<Vec<Uuid>, RepositoryError>;

    async fn write_result(&self, new: NewResult) -> Result<result::Model, RepositoryError>;
}

pub struct SeaOrmStore {
    documents: DocumentRepository,
    requests: AnalysisRequestRepository,
    results: ResultRepository,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            documents: DocumentRepository::new(db.clone()),
            requests: AnalysisRequestRepository::new(db.clone()),
            results: ResultRepository::new(db),
        }
    }

    /// See [`AnalysisRequestRepository::with_processing_timeout`].
    pub fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.requests = self.requests.with_processing_timeout(timeout);
        self
    }
}

#[async_trait]
impl AnalysisStore for SeaOrmStore {
    async fn load_job(&self, request_id: Uuid) -> Result<AnalysisJob, RepositoryError> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("analysis request {request_id}")))?;

        let document = self
            .documents
            .find_by_id(request.document_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("document {}", request.document_id)))?;

        Ok(AnalysisJob { request, document })
    }

    async fn claim(&self, request_id: Uuid) -> Result<bool, RepositoryError> {
        self.requests.claim(request_id).await
    }

    async fn mark_failed(&self, request_id: Uuid, message: &str) -> Result<(), RepositoryError> {
        self.requests.mark_failed(request_id, message).await
    }

    async fn release(&self, request_id: Uuid) -> Result<(), RepositoryError> {
        self.requests.release(request_id).await
    }

    async fn retryable_requests(&self) -> Result<Vec<Uuid>, RepositoryError> {
        self.requests.retryable_ids().await
    }

    async fn write_result(&self, new: NewResult) -> Result<result::Model, RepositoryError> {
        self.results.write_result(new).await
    }
}
