//! # AnalysisRequest Repository
//!
//! Creation of analysis requests and the status transitions driven by the
//! executor. The transition to `completed` happens inside the result write
//! transaction (see [`super::result::ResultRepository::write_result`]).

use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Iterable,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::analysis_request::{ActiveModel, AnalysisStatus, Column, Entity, Model};
use crate::models::document;

/// Longest error message kept on a failed request.
const MAX_ERROR_CHARS: usize = 1000;

/// Matches the executor's default run limit.
const DEFAULT_PROCESSING_TIMEOUT: Duration = Duration::from_secs(300);

/// Slack past the run limit before a `processing` row counts as abandoned.
const RECLAIM_GRACE: Duration = Duration::from_secs(30);

/// Repository for analysis request database operations
pub struct AnalysisRequestRepository {
    db: DatabaseConnection,
    processing_timeout: Duration,
}

impl AnalysisRequestRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            processing_timeout: DEFAULT_PROCESSING_TIMEOUT,
        }
    }

    /// Longest a live run can keep a request in `processing`.
    ///
    /// Rows left in `processing` for longer (plus a short grace period) were
    /// abandoned by a crashed process and may be claimed again.
    pub fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = timeout;
        self
    }

    fn stale_cutoff(&self) -> DateTime<FixedOffset> {
        let age = TimeDelta::from_std(self.processing_timeout + RECLAIM_GRACE)
            .unwrap_or(TimeDelta::MAX);
        Utc::now()
            .checked_sub_signed(age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .fixed_offset()
    }

    /// `processing` rows whose run can no longer be alive.
    fn abandoned(&self) -> Condition {
        Condition::all()
            .add(Column::Status.eq(AnalysisStatus::Processing))
            .add(Column::UpdatedAt.lt(self.stale_cutoff()))
    }

    /// Submit a new analysis of `document_id` at `input_voltage`
    pub async fn create(
        &self,
        document_id: Uuid,
        input_voltage: f64,
        comment: Option<String>,
    ) -> Result<Model, RepositoryError> {
        if !input_voltage.is_finite() {
            return Err(RepositoryError::Validation(format!(
                "input voltage must be finite, got {input_voltage}"
            )));
        }

        let document = document::Entity::find_by_id(document_id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))?;

        if document.is_deleted {
            return Err(RepositoryError::Validation(format!(
                "document {document_id} has been deleted"
            )));
        }

        let now = Utc::now().fixed_offset();
        let request = ActiveModel {
            id: Set(Uuid::new_v4()),
            document_id: Set(document_id),
            input_voltage: Set(input_voltage),
            comment: Set(comment),
            status: Set(AnalysisStatus::Pending),
            is_processed: Set(false),
            attempts: Set(0),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let request = request
            .insert(&self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        info!(
            request_id = %request.id,
            document_id = %document_id,
            input_voltage,
            "Analysis request created"
        );
        Ok(request)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// All requests for a document, oldest first
    pub async fn list_by_document(&self, document_id: Uuid) -> Result<Vec<Model>, RepositoryError> {
        Entity::find()
            .filter(Column::DocumentId.eq(document_id))
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Atomically move an unprocessed, idle request to `processing`.
    ///
    /// Returns false when the request is already processed or a live run is
    /// processing it. Abandoned `processing` rows are taken over.
    pub async fn claim(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(AnalysisStatus::Processing))
            .col_expr(Column::Attempts, Expr::col(Column::Attempts).add(1))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(id))
            .filter(Column::IsProcessed.eq(false))
            .filter(
                Condition::any()
                    .add(Column::Status.ne(AnalysisStatus::Processing))
                    .add(self.abandoned()),
            )
            .exec(&self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected == 1)
    }

    /// Record a failed run; the request stays unprocessed and retryable
    pub async fn mark_failed(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        let message: String = message.chars().take(MAX_ERROR_CHARS).collect();
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(AnalysisStatus::Failed))
            .col_expr(Column::LastError, Expr::value(message))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(id))
            .filter(Column::IsProcessed.eq(false))
            .exec(&self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        if result.rows_affected == 0 {
            warn!(request_id = %id, "Failed run not recorded; request missing or already processed");
        }
        Ok(())
    }

    /// Return an interrupted request to `pending`
    pub async fn release(&self, id: Uuid) -> Result<(), RepositoryError> {
        Entity::update_many()
            .col_expr(Column::Status, Expr::value(AnalysisStatus::Pending))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(id))
            .filter(Column::IsProcessed.eq(false))
            .exec(&self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(())
    }

    /// Ids of unprocessed requests that are pending, failed or abandoned
    /// mid-run, oldest first
    pub async fn retryable_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let retryable: Vec<AnalysisStatus> = AnalysisStatus::iter()
            .filter(AnalysisStatus::is_retryable)
            .collect();

        Entity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::IsProcessed.eq(false))
            .filter(
                Condition::any()
                    .add(Column::Status.is_in(retryable))
                    .add(self.abandoned()),
            )
            .order_by_asc(Column::CreatedAt)
            .into_tuple::<Uuid>()
            .all(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
