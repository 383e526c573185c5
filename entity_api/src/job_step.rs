//! Checkpoint rows for job_steps table.

use super::error::Error;
use entity::job_steps::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait, QueryOrder};

/// Finds the checkpoint of one step of a run
pub async fn find(
    db: &impl ConnectionTrait,
    job_event_id: Id,
    step_key: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::JobEventId.eq(job_event_id))
        .filter(Column::StepKey.eq(step_key))
        .one(db)
        .await?)
}

/// Records the output of a completed step
pub async fn create(
    db: &impl ConnectionTrait,
    job_event_id: Id,
    step_key: &str,
    output: Json,
) -> Result<Model, Error> {
    trace!("Checkpointing step {step_key} of run {job_event_id}");

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        job_event_id: Set(job_event_id),
        step_key: Set(step_key.to_string()),
        output: Set(output),
        created_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}

/// Every checkpoint of a run in completion order
pub async fn find_by_job_event(
    db: &impl ConnectionTrait,
    job_event_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::JobEventId.eq(job_event_id))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?)
}
