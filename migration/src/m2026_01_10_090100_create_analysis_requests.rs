//! Migration to create the analysis_requests table.
//!
//! One row per submitted analysis. The `status` column tracks the executor
//! lifecycle (`pending`, `processing`, `completed`, `failed`) while
//! `is_processed` flips only when a result has been committed.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AnalysisRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AnalysisRequests::DocumentId).uuid().not_null())
                    .col(
                        ColumnDef::new(AnalysisRequests::InputVoltage)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AnalysisRequests::Comment).text().null())
                    .col(
                        ColumnDef::new(AnalysisRequests::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(AnalysisRequests::IsProcessed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AnalysisRequests::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AnalysisRequests::LastError).text().null())
                    .col(
                        ColumnDef::new(AnalysisRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AnalysisRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_analysis_requests_document_id")
                            .from(AnalysisRequests::Table, AnalysisRequests::DocumentId)
                            .to(Documents::Table, Documents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_requests_document_id")
                    .table(AnalysisRequests::Table)
                    .col(AnalysisRequests::DocumentId)
                    .to_owned(),
            )
            .await?;

        // Retry sweeps look up unprocessed requests by status.
        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_requests_status_processed")
                    .table(AnalysisRequests::Table)
                    .col(AnalysisRequests::Status)
                    .col(AnalysisRequests::IsProcessed)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_analysis_requests_status_processed")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_analysis_requests_document_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AnalysisRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AnalysisRequests {
    Table,
    Id,
    DocumentId,
    InputVoltage,
    Comment,
    Status,
    IsProcessed,
    Attempts,
    LastError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
}
