//! Evaluation job database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::{EvaluationJob, JobStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "evaluation_job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub criteria_id: Uuid,
    pub agent_name: String,
    pub version: i32,
    #[sea_orm(column_type = "Text")]
    pub prompt: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub output: Option<String>,
    /// One of pending, in_progress, completed, failed
    pub status: String,
    pub results: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::criteria::Entity",
        from = "Column::CriteriaId",
        to = "super::criteria::Column::Id",
        on_delete = "Cascade"
    )]
    Criteria,
}

impl Related<super::criteria::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Criteria.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for EvaluationJob {
    fn from(model: Model) -> Self {
        EvaluationJob {
            id: model.id,
            criteria_id: model.criteria_id,
            agent_name: model.agent_name,
            version: model.version,
            prompt: model.prompt,
            output: model.output,
            status: JobStatus::from(model.status.as_str()),
            results: model.results,
            error_message: model.error_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
        }
    }
}
