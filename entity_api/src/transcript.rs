//! CRUD operations for transcripts table.

use super::error::{EntityApiErrorKind, Error};
use entity::transcript_status::TranscriptStatus;
use entity::transcripts::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{Set, Unchanged},
    ConnectionTrait, QueryOrder,
};

/// Fields of a transcript produced by speech-to-text.
#[derive(Debug, Clone)]
pub struct NewTranscript {
    pub meeting_id: Id,
    pub recording_id: Id,
    pub content: String,
    pub language: String,
    pub word_count: i32,
    pub status: TranscriptStatus,
}

/// Inserts a new transcript. Transcripts are never updated in place apart from
/// their status; a re-transcription inserts another row.
pub async fn create(db: &impl ConnectionTrait, new: NewTranscript) -> Result<Model, Error> {
    debug!(
        "Creating transcript for recording {} of meeting {}",
        new.recording_id, new.meeting_id
    );

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        meeting_id: Set(new.meeting_id),
        recording_id: Set(new.recording_id),
        content: Set(new.content),
        language: Set(new.language),
        word_count: Set(new.word_count),
        status: Set(new.status),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Ok(active_model.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Finds the current transcript of a meeting, which is the most recently created one
pub async fn find_latest_by_meeting_id(
    db: &impl ConnectionTrait,
    meeting_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::MeetingId.eq(meeting_id))
        .order_by_desc(Column::CreatedAt)
        .one(db)
        .await?)
}

/// Finds the newest `ready` transcript produced from a recording
pub async fn find_ready_by_recording_id(
    db: &impl ConnectionTrait,
    recording_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::RecordingId.eq(recording_id))
        .filter(Column::Status.eq(TranscriptStatus::Ready))
        .order_by_desc(Column::CreatedAt)
        .one(db)
        .await?)
}

/// Moves a transcript to `status` with the same rules as recordings: repeating
/// the current status is a no-op, terminal statuses never change.
pub async fn update_status(
    db: &impl ConnectionTrait,
    id: Id,
    status: TranscriptStatus,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    if existing.status == status {
        return Ok(existing);
    }

    if !existing.status.can_transition_to(status) {
        warn!(
            "Refusing to move transcript {id} from {} to {status}",
            existing.status
        );
        return Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::InvalidStatusTransition,
        });
    }

    debug!("Updating transcript status to {status}: {id}");

    let active_model = ActiveModel {
        id: Unchanged(existing.id),
        meeting_id: Unchanged(existing.meeting_id),
        recording_id: Unchanged(existing.recording_id),
        content: Unchanged(existing.content),
        language: Unchanged(existing.language),
        word_count: Unchanged(existing.word_count),
        status: Set(status),
        created_at: Unchanged(existing.created_at),
        updated_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.update(db).await?)
}
