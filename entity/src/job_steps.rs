//! SeaORM Entity for job_steps table.
//! Checkpointed output of one completed step of a run.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    pub job_event_id: Id,

    /// `<function id>:<step id>`, unique per run
    pub step_key: String,

    pub output: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job_events::Entity",
        from = "Column::JobEventId",
        to = "super::job_events::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    JobEvents,
}

impl Related<super::job_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
