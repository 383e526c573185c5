use super::error::Error;
use entity::meetings::{Entity, Model};
use entity::Id;
use sea_orm::{entity::prelude::*, ConnectionTrait};

/// Finds a meeting by ID, `None` when it has been deleted
pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Option<Model>, Error> {
    Ok(Entity::find_by_id(id).one(db).await?)
}
