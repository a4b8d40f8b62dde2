//! Database migrations for the transient analysis service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_10_090000_create_documents;
mod m2026_01_10_090100_create_analysis_requests;
mod m2026_01_10_090200_create_results;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_10_090000_create_documents::Migration),
            Box::new(m2026_01_10_090100_create_analysis_requests::Migration),
            Box::new(m2026_01_10_090200_create_results::Migration),
        ]
    }
}
