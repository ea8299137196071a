//! Migration: Create the evaluation_criteria table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EvaluationCriteria::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EvaluationCriteria::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EvaluationCriteria::AgentName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EvaluationCriteria::Version)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EvaluationCriteria::CriteriaYaml)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EvaluationCriteria::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_evaluation_criteria_agent_name")
                    .table(EvaluationCriteria::Table)
                    .col(EvaluationCriteria::AgentName)
                    .to_owned(),
            )
            .await?;

        // One criteria document per agent/version pair
        manager
            .create_index(
                Index::create()
                    .name("uq_criteria_agent_version")
                    .table(EvaluationCriteria::Table)
                    .col(EvaluationCriteria::AgentName)
                    .col(EvaluationCriteria::Version)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EvaluationCriteria::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum EvaluationCriteria {
    Table,
    Id,
    AgentName,
    Version,
    CriteriaYaml,
    CreatedAt,
}
