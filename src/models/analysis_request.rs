//! AnalysisRequest entity model
//!
//! One row per submitted analysis of a document at a given input voltage.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Executor lifecycle of an analysis request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl AnalysisStatus {
    /// Whether the executor should pick this request up again on a retry sweep.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisStatus::Pending | AnalysisStatus::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analysis_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// Step amplitude applied to the system, in volts
    pub input_voltage: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub status: AnalysisStatus,

    /// Set in the same transaction that commits a result
    pub is_processed: bool,

    /// Number of times the executor has started this request
    pub attempts: i32,

    /// Error message of the most recent failed run
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
    #[sea_orm(has_many = "super::result::Entity")]
    Results,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl Related<super::result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
