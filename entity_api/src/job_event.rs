//! Queue operations for job_events table.
//!
//! A job event row is both the queued delivery and the run it starts: its id
//! is the run id that step checkpoints are stored under.

use super::error::{EntityApiErrorKind, Error};
use entity::job_event_status::JobEventStatus;
use entity::job_events::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{Set, Unchanged},
    ConnectionTrait, DbErr, QueryOrder,
};

/// Enqueues a new pending event, deliverable immediately
pub async fn create(db: &impl ConnectionTrait, name: &str, payload: Json) -> Result<Model, Error> {
    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        name: Set(name.to_string()),
        payload: Set(payload),
        status: Set(JobEventStatus::Pending),
        attempts: Set(0),
        run_after: Set(now.into()),
        last_error: Set(None),
        output: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let model = active_model.insert(db).await?;
    debug!("Enqueued job event {} ({name})", model.id);
    Ok(model)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Claims the oldest pending event that is due at `now`, moving it to
/// `running` and counting the attempt.
///
/// The claim is a conditional update on `status = pending`, so when several
/// workers race for the same row exactly one of them gets it; the others see
/// `None` and poll again.
pub async fn claim_next(
    db: &impl ConnectionTrait,
    now: DateTimeWithTimeZone,
) -> Result<Option<Model>, Error> {
    let candidate = Entity::find()
        .filter(Column::Status.eq(JobEventStatus::Pending))
        .filter(Column::RunAfter.lte(now))
        .order_by_asc(Column::RunAfter)
        .order_by_asc(Column::CreatedAt)
        .one(db)
        .await?;

    let Some(candidate) = candidate else {
        return Ok(None);
    };

    let active_model = ActiveModel {
        id: Unchanged(candidate.id),
        status: Set(JobEventStatus::Running),
        attempts: Set(candidate.attempts + 1),
        updated_at: Set(now),
        ..Default::default()
    };

    match Entity::update(active_model)
        .filter(Column::Status.eq(JobEventStatus::Pending))
        .exec(db)
        .await
    {
        Ok(claimed) => {
            trace!("Claimed job event {} attempt {}", claimed.id, claimed.attempts);
            Ok(Some(claimed))
        }
        Err(DbErr::RecordNotUpdated) => {
            debug!("Job event {} was claimed by another worker", candidate.id);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Marks a running event as completed with the run's output
pub async fn complete(db: &impl ConnectionTrait, id: Id, output: Json) -> Result<Model, Error> {
    let active_model = ActiveModel {
        id: Unchanged(id),
        status: Set(JobEventStatus::Completed),
        output: Set(Some(output)),
        last_error: Set(None),
        updated_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    finish(db, active_model).await
}

/// Returns a running event to the queue, deliverable again at `run_after`.
/// Checkpoints of the run are kept, so the next attempt resumes.
pub async fn reschedule(
    db: &impl ConnectionTrait,
    id: Id,
    run_after: DateTimeWithTimeZone,
    error: String,
) -> Result<Model, Error> {
    let active_model = ActiveModel {
        id: Unchanged(id),
        status: Set(JobEventStatus::Pending),
        run_after: Set(run_after),
        last_error: Set(Some(error)),
        updated_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    finish(db, active_model).await
}

/// Marks a running event as permanently failed
pub async fn fail(db: &impl ConnectionTrait, id: Id, error: String) -> Result<Model, Error> {
    let active_model = ActiveModel {
        id: Unchanged(id),
        status: Set(JobEventStatus::Failed),
        last_error: Set(Some(error)),
        updated_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    finish(db, active_model).await
}

/// Only the worker holding a run may finish it; a run re-queued from under
/// a slow worker is left to its new owner.
async fn finish(db: &impl ConnectionTrait, active_model: ActiveModel) -> Result<Model, Error> {
    match Entity::update(active_model)
        .filter(Column::Status.eq(JobEventStatus::Running))
        .exec(db)
        .await
    {
        Ok(model) => Ok(model),
        Err(DbErr::RecordNotUpdated) => Err(Error {
            source: Some(DbErr::RecordNotUpdated),
            error_kind: EntityApiErrorKind::RecordNotUpdated,
        }),
        Err(err) => Err(err.into()),
    }
}

/// Puts runs that have been `running` since before `stale_before` back in the
/// queue. Returns how many were re-queued.
pub async fn requeue_stale(
    db: &impl ConnectionTrait,
    stale_before: DateTimeWithTimeZone,
) -> Result<u64, Error> {
    let stale = Entity::find()
        .filter(Column::Status.eq(JobEventStatus::Running))
        .filter(Column::UpdatedAt.lt(stale_before))
        .all(db)
        .await?;

    let mut requeued = 0;
    for event in stale {
        let active_model = ActiveModel {
            id: Unchanged(event.id),
            status: Set(JobEventStatus::Pending),
            run_after: Set(stale_before),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        match Entity::update(active_model)
            .filter(Column::Status.eq(JobEventStatus::Running))
            .filter(Column::UpdatedAt.lt(stale_before))
            .exec(db)
            .await
        {
            Ok(_) => {
                warn!(
                    "Re-queued stale job event {} ({}) after attempt {}",
                    event.id, event.name, event.attempts
                );
                requeued += 1;
            }
            Err(DbErr::RecordNotUpdated) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(requeued)
}
