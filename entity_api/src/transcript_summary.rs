//! CRUD operations for transcript_summaries table.

use super::error::Error;
use entity::transcript_summaries::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait};

/// Inserts the summary of a transcript. Empty extraction lists are stored as
/// NULL rather than as empty JSON arrays.
pub async fn create(
    db: &impl ConnectionTrait,
    transcript_id: Id,
    summary: String,
    key_points: Vec<String>,
    action_items: Vec<String>,
) -> Result<Model, Error> {
    debug!(
        "Creating summary for transcript {transcript_id} ({} key points, {} action items)",
        key_points.len(),
        action_items.len()
    );

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        transcript_id: Set(transcript_id),
        summary: Set(summary),
        key_points: Set(json_list_or_null(key_points)),
        action_items: Set(json_list_or_null(action_items)),
        created_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}

pub async fn find_by_transcript_id(
    db: &impl ConnectionTrait,
    transcript_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::TranscriptId.eq(transcript_id))
        .one(db)
        .await?)
}

fn json_list_or_null(items: Vec<String>) -> Option<Json> {
    if items.is_empty() {
        None
    } else {
        Some(Json::from(items))
    }
}
