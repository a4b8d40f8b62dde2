//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for
//! documents, analysis requests and versioned results.

pub mod analysis_request;
pub mod document;
pub mod result;
pub mod store;

pub use analysis_request::AnalysisRequestRepository;
pub use document::DocumentRepository;
pub use result::{NewResult, ResultRepository};
pub use store::{AnalysisJob, AnalysisStore, SeaOrmStore};
