//! SeaORM Entity for transcripts table.
//! Stores the text transcription of a recording.

use crate::transcript_status::TranscriptStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transcripts")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    pub meeting_id: Id,

    pub recording_id: Id,

    /// Full formatted transcript text
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Language code the transcript was produced in
    pub language: String,

    /// Whitespace-separated token count of `content`
    pub word_count: i32,

    pub status: TranscriptStatus,

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

    #[sea_orm(
        belongs_to = "super::recordings::Entity",
        from = "Column::RecordingId",
        to = "super::recordings::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Recordings,

    #[sea_orm(has_one = "super::transcript_summaries::Entity")]
    TranscriptSummaries,
}

impl Related<super::meetings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meetings.def()
    }
}

impl Related<super::recordings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recordings.def()
    }
}

impl Related<super::transcript_summaries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TranscriptSummaries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
