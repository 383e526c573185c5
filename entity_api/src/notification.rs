//! CRUD operations for notifications table.

use super::error::Error;
use entity::notification_type::NotificationType;
use entity::notifications::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait, QueryOrder};

/// Inserts an unread notification for `user_id`
pub async fn create(
    db: &impl ConnectionTrait,
    user_id: Id,
    notification_type: NotificationType,
    from_user_id: Option<Id>,
    metadata: Json,
) -> Result<Model, Error> {
    debug!("Creating {notification_type} notification for user {user_id}");

    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        user_id: Set(user_id),
        notification_type: Set(notification_type),
        from_user_id: Set(from_user_id),
        metadata: Set(metadata),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}

/// Notifications of a user, newest first
pub async fn find_by_user(db: &impl ConnectionTrait, user_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?)
}
