//! # Error Handling
//!
//! Error types for the analysis pipeline and its persistence layer.

use sea_orm::sqlx::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

use crate::predictor::PredictorError;
use crate::source::SourceError;

/// Errors raised by repositories and the analysis store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    /// The database was locked by another writer; safe to retry
    #[error("database busy: {0}")]
    Busy(String),
}

impl RepositoryError {
    /// Maps a database error, surfacing unique-constraint violations as
    /// [`RepositoryError::Conflict`] and SQLite lock contention as
    /// [`RepositoryError::Busy`].
    pub fn database_error(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return RepositoryError::Conflict(error.to_string());
        }
        if is_sqlite_busy(&error) {
            tracing::debug!(?error, "Database locked by another writer");
            return RepositoryError::Busy(error.to_string());
        }
        RepositoryError::Database(error)
    }

    /// Whether repeating the failed write may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Conflict(_) | RepositoryError::Busy(_))
    }
}

/// Errors that abort an analysis run.
///
/// [`AnalysisError::InsufficientData`] and [`AnalysisError::PredictorUnavailable`]
/// are recovered from inside the pipeline and only surface from the individual
/// stages that produce them.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("recording contains no numeric time/value pairs")]
    EmptyDataset,
    #[error("{samples} samples are too few to extract features")]
    InsufficientData { samples: usize },
    #[error("predictor unavailable: {0}")]
    PredictorUnavailable(#[from] PredictorError),
    #[error("document source error: {0}")]
    Source(#[from] SourceError),
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("analysis request {0} not found")]
    RequestNotFound(Uuid),
    #[error("document {0} has been deleted")]
    DocumentDeleted(Uuid),
    #[error("failed to serialize result payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("analysis exceeded {seconds}s run limit")]
    TimedOut { seconds: u64 },
}

fn sqlx_database_error(error: &sea_orm::DbErr) -> Option<&dyn DatabaseError> {
    use sea_orm::RuntimeErr;

    match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Conn(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err.as_database_error(),
        _ => None,
    }
}

/// `SQLITE_BUSY` and its extended codes (recovery, snapshot, timeout).
fn is_sqlite_busy(error: &sea_orm::DbErr) -> bool {
    const SQLITE_BUSY_CODES: &[&str] = &["5", "261", "517", "773"];

    if let Some(db_error) = sqlx_database_error(error) {
        if db_error
            .code()
            .is_some_and(|code| SQLITE_BUSY_CODES.contains(&code.as_ref()))
        {
            return true;
        }
    }
    error.to_string().contains("database is locked")
}

fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let Some(db_error) = sqlx_database_error(error) else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}
