//! # Result Repository
//!
//! Versioned result persistence. A write supersedes every earlier result of
//! the same document, inserts the new version and marks the originating
//! request processed, all in one transaction.

use std::time::Duration;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set,
    TransactionTrait,
};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::analysis_request::{self, AnalysisStatus};
use crate::models::document;
use crate::models::result::{ActiveModel, Column, Entity, Model, SystemType};

/// Attempts made when a concurrent writer claims the same version first or
/// holds the database lock.
const MAX_WRITE_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(25);

/// Everything needed to persist one analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub analysis_request_id: Uuid,
    pub system_type: SystemType,
    pub description: String,
    pub poles: JsonValue,
    pub raw_metrics: JsonValue,
    pub optimized_series: JsonValue,
    pub technical_summary: JsonValue,
    pub ml_predicted_type: Option<i32>,
    pub ml_pole1_real: Option<f64>,
    pub ml_pole1_imag: Option<f64>,
    pub ml_pole2_real: Option<f64>,
    pub ml_pole2_imag: Option<f64>,
    pub ml_confidence: Option<f64>,
}

/// Repository for result database operations
pub struct ResultRepository {
    db: DatabaseConnection,
}

impl ResultRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persist `new` as the latest result of its document.
    ///
    /// Retries with exponential backoff when another writer commits the same
    /// version concurrently or holds the database lock. Nothing is written if
    /// any step fails.
    pub async fn write_result(&self, new: NewResult) -> Result<Model, RepositoryError> {
        let mut attempt = 1;
        let mut delay = RETRY_BASE_DELAY;
        loop {
            match self.write_once(&new).await {
                Err(err) if err.is_transient() && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        request_id = %new.analysis_request_id,
                        attempt,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "Result write contended, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    delay *= 2;
                }
                other => return other,
            }
        }
    }

    async fn write_once(&self, new: &NewResult) -> Result<Model, RepositoryError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        // Dropping `txn` on any early return rolls it back.
        acquire_write_lock(&txn, new.analysis_request_id).await?;

        let request = analysis_request::Entity::find_by_id(new.analysis_request_id)
            .one(&txn)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("analysis request {}", new.analysis_request_id))
            })?;

        if request.is_processed {
            return Err(RepositoryError::Validation(format!(
                "analysis request {} already has a committed result",
                request.id
            )));
        }

        let document_id = request.document_id;
        lock_document(&txn, document_id).await?;

        let version = next_version(&txn, document_id).await?;

        let superseded = Entity::update_many()
            .col_expr(Column::IsLatest, Expr::value(false))
            .filter(
                Column::AnalysisRequestId.in_subquery(
                    analysis_request::Entity::find()
                        .select_only()
                        .column(analysis_request::Column::Id)
                        .filter(analysis_request::Column::DocumentId.eq(document_id))
                        .into_query(),
                ),
            )
            .filter(Column::IsLatest.eq(true))
            .exec(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        let now = Utc::now().fixed_offset();
        let result = ActiveModel {
            id: Set(Uuid::new_v4()),
            analysis_request_id: Set(request.id),
            document_id: Set(document_id),
            version: Set(version),
            system_type: Set(new.system_type),
            description: Set(new.description.clone()),
            poles: Set(new.poles.clone()),
            raw_metrics: Set(new.raw_metrics.clone()),
            optimized_series: Set(new.optimized_series.clone()),
            technical_summary: Set(new.technical_summary.clone()),
            is_latest: Set(true),
            ml_predicted_type: Set(new.ml_predicted_type),
            ml_pole1_real: Set(new.ml_pole1_real),
            ml_pole1_imag: Set(new.ml_pole1_imag),
            ml_pole2_real: Set(new.ml_pole2_real),
            ml_pole2_imag: Set(new.ml_pole2_imag),
            ml_confidence: Set(new.ml_confidence),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(RepositoryError::database_error)?;

        let mut request: analysis_request::ActiveModel = request.into();
        request.is_processed = Set(true);
        request.status = Set(AnalysisStatus::Completed);
        request.last_error = Set(None);
        request.updated_at = Set(now);
        request
            .update(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)?;

        info!(
            result_id = %result.id,
            document_id = %document_id,
            version,
            superseded = superseded.rows_affected,
            "Result committed"
        );
        Ok(result)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// The single latest result of a document, if any
    pub async fn latest_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Option<Model>, RepositoryError> {
        Entity::find()
            .filter(Column::DocumentId.eq(document_id))
            .filter(Column::IsLatest.eq(true))
            .one(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// The result produced by a request, if it is still the latest for its document
    pub async fn latest_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<Model>, RepositoryError> {
        Entity::find()
            .filter(Column::AnalysisRequestId.eq(request_id))
            .filter(Column::IsLatest.eq(true))
            .one(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// All results for analysis requests of a document, newest version first
    pub async fn history(&self, document_id: Uuid) -> Result<Vec<Model>, RepositoryError> {
        Entity::find()
            .filter(
                Column::AnalysisRequestId.in_subquery(
                    analysis_request::Entity::find()
                        .select_only()
                        .column(analysis_request::Column::Id)
                        .filter(analysis_request::Column::DocumentId.eq(document_id))
                        .into_query(),
                ),
            )
            .order_by_desc(Column::Version)
            .all(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

/// Takes SQLite's database write lock before the transaction reads anything.
///
/// A deferred transaction that reads first cannot wait for the lock when it
/// later writes; it fails with `SQLITE_BUSY` instead. Touching the request row
/// as the first statement makes the connection queue on the busy timeout the
/// way `BEGIN IMMEDIATE` would.
async fn acquire_write_lock(txn: &DatabaseTransaction, request_id: Uuid) -> Result<(), RepositoryError> {
    if txn.get_database_backend() != DbBackend::Sqlite {
        return Ok(());
    }

    analysis_request::Entity::update_many()
        .col_expr(
            analysis_request::Column::UpdatedAt,
            Expr::col(analysis_request::Column::UpdatedAt).into(),
        )
        .filter(analysis_request::Column::Id.eq(request_id))
        .exec(txn)
        .await
        .map_err(RepositoryError::database_error)?;
    Ok(())
}

/// Serializes writers of the same document on backends with row locks.
async fn lock_document(txn: &DatabaseTransaction, document_id: Uuid) -> Result<(), RepositoryError> {
    if txn.get_database_backend() != DbBackend::Postgres {
        // SQLite writers already hold the database lock.
        return Ok(());
    }

    document::Entity::find_by_id(document_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(RepositoryError::database_error)?
        .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))?;

    debug!(document_id = %document_id, "Document row locked for result write");
    Ok(())
}

async fn next_version(txn: &DatabaseTransaction, document_id: Uuid) -> Result<i32, RepositoryError> {
    let current = Entity::find()
        .select_only()
        .column_as(Column::Version.max(), "max_version")
        .filter(Column::DocumentId.eq(document_id))
        .into_tuple::<Option<i32>>()
        .one(txn)
        .await
        .map_err(RepositoryError::database_error)?
        .flatten();

    Ok(current.unwrap_or(0) + 1)
}
