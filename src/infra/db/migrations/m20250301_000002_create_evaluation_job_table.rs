//! Migration: Create the evaluation_job table.

use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_evaluation_criteria_table::EvaluationCriteria;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EvaluationJob::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EvaluationJob::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EvaluationJob::CriteriaId).uuid().not_null())
                    .col(
                        ColumnDef::new(EvaluationJob::AgentName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EvaluationJob::Version).integer().not_null())
                    .col(ColumnDef::new(EvaluationJob::Prompt).text().not_null())
                    .col(ColumnDef::new(EvaluationJob::Output).text().null())
                    .col(
                        ColumnDef::new(EvaluationJob::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending")
                            .check(
                                Expr::col(EvaluationJob::Status).is_in([
                                    "pending",
                                    "in_progress",
                                    "completed",
                                    "failed",
                                ]),
                            ),
                    )
                    .col(ColumnDef::new(EvaluationJob::Results).json().null())
                    .col(ColumnDef::new(EvaluationJob::ErrorMessage).text().null())
                    .col(
                        ColumnDef::new(EvaluationJob::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EvaluationJob::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EvaluationJob::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_evaluation_job_criteria")
                            .from(EvaluationJob::Table, EvaluationJob::CriteriaId)
                            .to(EvaluationCriteria::Table, EvaluationCriteria::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_evaluation_job_criteria_id")
                    .table(EvaluationJob::Table)
                    .col(EvaluationJob::CriteriaId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_evaluation_job_agent_version")
                    .table(EvaluationJob::Table)
                    .col(EvaluationJob::AgentName)
                    .col(EvaluationJob::Version)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_evaluation_job_status")
                    .table(EvaluationJob::Table)
                    .col(EvaluationJob::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EvaluationJob::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EvaluationJob {
    Table,
    Id,
    CriteriaId,
    AgentName,
    Version,
    Prompt,
    Output,
    Status,
    Results,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
