//! SeaORM Entity for recordings table.
//! Tracks the captured media file of a meeting.

use crate::recording_status::RecordingStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "recordings")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    pub meeting_id: Id,

    /// Location of the media file in object storage
    pub file_url: Option<String>,

    /// Size of the media file in bytes
    pub file_size: Option<i64>,

    /// Duration of the recording in seconds
    pub duration_seconds: Option<i32>,

    /// Container format (e.g. mp4, webm)
    pub format: Option<String>,

    /// Current status of the recording
    pub status: RecordingStatus,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::meetings::Entity",
        from = "Column::MeetingId",
        to = "super::meetings::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Meetings,

    #[sea_orm(has_many = "super::transcripts::Entity")]
    Transcripts,
}

impl Related<super::meetings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meetings.def()
    }
}

impl Related<super::transcripts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transcripts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
