//! CRUD operations for recordings table.

use super::error::{EntityApiErrorKind, Error};
use entity::recording_status::RecordingStatus;
use entity::recordings::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{Set, Unchanged},
    ConnectionTrait, QueryOrder,
};

/// Creates a new recording in `processing` status
pub async fn create(
    db: &impl ConnectionTrait,
    meeting_id: Id,
    file_url: Option<String>,
) -> Result<Model, Error> {
    debug!("Creating new recording for meeting: {meeting_id}");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        meeting_id: Set(meeting_id),
        file_url: Set(file_url),
        file_size: Set(None),
        duration_seconds: Set(None),
        format: Set(None),
        status: Set(RecordingStatus::Processing),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Ok(active_model.insert(db).await?)
}

/// Finds a recording by ID
pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Moves a recording to `status`.
///
/// Writing the status a recording already has is a no-op that returns the
/// stored model. Any move out of a terminal status fails with
/// `InvalidStatusTransition` and leaves the row untouched.
pub async fn update_status(
    db: &impl ConnectionTrait,
    id: Id,
    status: RecordingStatus,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    if existing.status == status {
        trace!("Recording {id} already {status}");
        return Ok(existing);
    }

    if !existing.status.can_transition_to(status) {
        warn!(
            "Refusing to move recording {id} from {} to {status}",
            existing.status
        );
        return Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::InvalidStatusTransition,
        });
    }

    debug!("Updating recording status to {status}: {id}");

    let active_model = ActiveModel {
        id: Unchanged(existing.id),
        meeting_id: Unchanged(existing.meeting_id),
        file_url: Unchanged(existing.file_url),
        file_size: Unchanged(existing.file_size),
        duration_seconds: Unchanged(existing.duration_seconds),
        format: Unchanged(existing.format),
        status: Set(status),
        created_at: Unchanged(existing.created_at),
        updated_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.update(db).await?)
}

/// Finds every recording created strictly before `cutoff`, oldest first
pub async fn find_created_before(
    db: &impl ConnectionTrait,
    cutoff: DateTimeWithTimeZone,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::CreatedAt.lt(cutoff))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?)
}

/// Deletes a recording by ID. Transcripts and summaries cascade in the database.
pub async fn delete_by_id(db: &impl ConnectionTrait, id: Id) -> Result<(), Error> {
    let result = Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        debug!("Recording {id} was already gone");
    }
    Ok(())
}
