//! SeaORM Entity for job_events table.
//! One row per delivered event; the row id is the run id its checkpoints hang off.

use crate::job_event_status::JobEventStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    /// Event name, e.g. `recording.process`
    pub name: String,

    /// Event payload object
    pub payload: Json,

    pub status: JobEventStatus,

    /// Number of attempts started so far
    pub attempts: i32,

    /// Earliest time a worker may claim this event
    pub run_after: DateTimeWithTimeZone,

    #[sea_orm(column_type = "Text")]
    pub last_error: Option<String>,

    /// Output of the completed run
    pub output: Option<Json>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_steps::Entity")]
    JobSteps,
}

impl Related<super::job_steps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobSteps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
