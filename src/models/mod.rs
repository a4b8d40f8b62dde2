//! # Data Models
//!
//! SeaORM entities for documents, analysis requests and versioned results.

pub mod analysis_request;
pub mod document;
pub mod result;

pub use analysis_request::{AnalysisStatus, Entity as AnalysisRequest};
pub use document::Entity as Document;
pub use result::{Entity as AnalysisResult, SystemType};
