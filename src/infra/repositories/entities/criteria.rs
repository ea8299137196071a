//! Evaluation criteria database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::EvaluationCriteria;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "evaluation_criteria")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub agent_name: String,
    pub version: i32,
    #[sea_orm(column_type = "Text")]
    pub criteria_yaml: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::evaluation_job::Entity")]
    EvaluationJob,
}

impl Related<super::evaluation_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EvaluationJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for EvaluationCriteria {
    fn from(model: Model) -> Self {
        EvaluationCriteria {
            id: model.id,
            agent_name: model.agent_name,
            version: model.version,
            criteria_yaml: model.criteria_yaml,
            created_at: model.created_at,
        }
    }
}
