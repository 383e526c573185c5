//! CRUD operations for subscriptions table.

use super::error::Error;
use entity::subscription_plan::SubscriptionPlan;
use entity::subscription_status::SubscriptionStatus;
use entity::subscriptions::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{NotSet, Set, Unchanged},
    ConnectionTrait,
};

/// Reconciled state to write onto a local subscription.
///
/// `None` period bounds leave the stored values untouched, as does a `None`
/// plan.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingState {
    pub status: SubscriptionStatus,
    pub plan: Option<SubscriptionPlan>,
    pub current_period_start: Option<DateTimeWithTimeZone>,
    pub current_period_end: Option<DateTimeWithTimeZone>,
}

pub async fn find_by_external_id(
    db: &impl ConnectionTrait,
    external_subscription_id: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::ExternalSubscriptionId.eq(external_subscription_id))
        .one(db)
        .await?)
}

/// Writes `state` onto the subscription with the given billing provider id.
/// Pass a transaction to make the write atomic with surrounding reads.
pub async fn apply_billing_state(
    db: &impl ConnectionTrait,
    external_subscription_id: &str,
    state: BillingState,
) -> Result<Model, Error> {
    let existing = find_by_external_id(db, external_subscription_id)
        .await?
        .ok_or_else(Error::not_found)?;

    debug!(
        "Updating subscription {} ({external_subscription_id}) to {} / {:?}",
        existing.id, state.status, state.plan
    );

    let active_model = ActiveModel {
        id: Unchanged(existing.id),
        user_id: Unchanged(existing.user_id),
        external_subscription_id: Unchanged(existing.external_subscription_id),
        plan: state.plan.map_or(NotSet, Set),
        status: Set(state.status),
        current_period_start: state
            .current_period_start
            .map_or(NotSet, |start| Set(Some(start))),
        current_period_end: state
            .current_period_end
            .map_or(NotSet, |end| Set(Some(end))),
        created_at: Unchanged(existing.created_at),
        updated_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.update(db).await?)
}
