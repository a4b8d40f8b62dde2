//! Result entity model
//!
//! Results are immutable once written, apart from `is_latest` which flips to
//! false when a newer version for the same document is committed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Dynamic classification of the analysed system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SystemType {
    #[sea_orm(string_value = "underdamped")]
    #[default]
    Underdamped,
    #[sea_orm(string_value = "overdamped")]
    Overdamped,
    #[sea_orm(string_value = "critically_damped")]
    CriticallyDamped,
    #[sea_orm(string_value = "unknown")]
    Unknown,
}

impl SystemType {
    /// Maps the predictor's integer class code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => SystemType::Underdamped,
            1 => SystemType::Overdamped,
            _ => SystemType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Underdamped => "underdamped",
            SystemType::Overdamped => "overdamped",
            SystemType::CriticallyDamped => "critically_damped",
            SystemType::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub analysis_request_id: Uuid,

    /// Denormalized owner, used for versioning and the latest-row guard
    pub document_id: Uuid,

    /// Per-document, starting at 1
    pub version: i32,

    pub system_type: SystemType,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Final pole pair as `[{"real", "imag"}, {"real", "imag"}]`
    #[sea_orm(column_type = "JsonBinary")]
    pub poles: JsonValue,

    #[sea_orm(column_type = "JsonBinary")]
    pub raw_metrics: JsonValue,

    /// `{"time": [...], "output": [...]}`
    #[sea_orm(column_type = "JsonBinary")]
    pub optimized_series: JsonValue,

    #[sea_orm(column_type = "JsonBinary")]
    pub technical_summary: JsonValue,

    pub is_latest: bool,

    pub ml_predicted_type: Option<i32>,
    pub ml_pole1_real: Option<f64>,
    pub ml_pole1_imag: Option<f64>,
    pub ml_pole2_real: Option<f64>,
    pub ml_pole2_imag: Option<f64>,
    pub ml_confidence: Option<f64>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis_request::Entity",
        from = "Column::AnalysisRequestId",
        to = "super::analysis_request::Column::Id",
        on_delete = "Cascade"
    )]
    AnalysisRequest,
}

impl Related<super::analysis_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
