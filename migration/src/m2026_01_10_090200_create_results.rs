//! Migration to create the results table.
//!
//! Results are versioned per document. A unique `(document_id, version)` index
//! rejects two writers claiming the same version, and a partial unique index
//! allows at most one `is_latest` row per document.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Results::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Results::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Results::AnalysisRequestId).uuid().not_null())
                    .col(ColumnDef::new(Results::DocumentId).uuid().not_null())
                    .col(ColumnDef::new(Results::Version).integer().not_null())
                    .col(ColumnDef::new(Results::SystemType).text().not_null())
                    .col(ColumnDef::new(Results::Description).text().not_null())
                    .col(ColumnDef::new(Results::Poles).json_binary().not_null())
                    .col(ColumnDef::new(Results::RawMetrics).json_binary().not_null())
                    .col(
                        ColumnDef::new(Results::OptimizedSeries)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Results::TechnicalSummary)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Results::IsLatest)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Results::MlPredictedType).integer().null())
                    .col(ColumnDef::new(Results::MlPole1Real).double().null())
                    .col(ColumnDef::new(Results::MlPole1Imag).double().null())
                    .col(ColumnDef::new(Results::MlPole2Real).double().null())
                    .col(ColumnDef::new(Results::MlPole2Imag).double().null())
                    .col(ColumnDef::new(Results::MlConfidence).double().null())
                    .col(
                        ColumnDef::new(Results::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_results_analysis_request_id")
                            .from(Results::Table, Results::AnalysisRequestId)
                            .to(AnalysisRequests::Table, AnalysisRequests::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_results_document_id")
                            .from(Results::Table, Results::DocumentId)
                            .to(Documents::Table, Documents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_results_analysis_request_id")
                    .table(Results::Table)
                    .col(Results::AnalysisRequestId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_results_document_version")
                    .table(Results::Table)
                    .col(Results::DocumentId)
                    .col(Results::Version)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Partial indexes are not expressible through the index builder.
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_results_document_latest \
                 ON results (document_id) WHERE is_latest"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "DROP INDEX IF EXISTS idx_results_document_latest".to_string(),
            ))
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_results_document_version")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_results_analysis_request_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Results::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Results {
    Table,
    Id,
    AnalysisRequestId,
    DocumentId,
    Version,
    SystemType,
    Description,
    Poles,
    RawMetrics,
    OptimizedSeries,
    TechnicalSummary,
    IsLatest,
    MlPredictedType,
    MlPole1Real,
    MlPole1Imag,
    MlPole2Real,
    MlPole2Imag,
    MlConfidence,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AnalysisRequests {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
}
