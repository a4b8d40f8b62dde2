//! Document entity model
//!
//! A document is an uploaded recording. `file_path` is either a local path or
//! an `http(s)://`/`file://` URL understood by the document sources.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Location of the recording
    pub file_path: String,

    /// Name the recording was uploaded under
    pub original_filename: String,

    /// Soft-delete flag; deleted documents accept no new analyses
    pub is_deleted: bool,

    pub uploaded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::analysis_request::Entity")]
    AnalysisRequests,
}

impl Related<super::analysis_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
