//! # Document Repository
//!
//! Registration, lookup and soft deletion of uploaded recordings.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::analysis_request;
use crate::models::document::{ActiveModel, Entity, Model};

/// Repository for document database operations
pub struct DocumentRepository {
    db: DatabaseConnection,
}

impl DocumentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Register a recording by location
    pub async fn create(
        &self,
        file_path: &str,
        original_filename: &str,
    ) -> Result<Model, RepositoryError> {
        if file_path.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "file path cannot be empty".to_string(),
            ));
        }

        let document = ActiveModel {
            id: Set(Uuid::new_v4()),
            file_path: Set(file_path.to_string()),
            original_filename: Set(original_filename.to_string()),
            is_deleted: Set(false),
            uploaded_at: Set(Utc::now().fixed_offset()),
        };

        let document = document
            .insert(&self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        tracing::info!(document_id = %document.id, file_path, "Document registered");
        Ok(document)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Mark a document deleted; its requests and results are kept until a hard delete
    pub async fn soft_delete(&self, id: Uuid) -> Result<Model, RepositoryError> {
        let document = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("document {id}")))?;

        let mut active: ActiveModel = document.into();
        active.is_deleted = Set(true);
        active
            .update(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Number of analysis requests ever submitted for a document
    pub async fn analysis_count(&self, id: Uuid) -> Result<u64, RepositoryError> {
        analysis_request::Entity::find()
            .filter(analysis_request::Column::DocumentId.eq(id))
            .count(&self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
