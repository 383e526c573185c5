//! SeaORM Entity for subscriptions table.
//! Local mirror of a user's billing-provider subscription.

use crate::subscription_plan::SubscriptionPlan;
use crate::subscription_status::SubscriptionStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    pub user_id: Id,

    /// Billing provider's subscription id (e.g. `sub_...`)
    #[sea_orm(unique)]
    pub external_subscription_id: Option<String>,

    pub plan: SubscriptionPlan,

    pub status: SubscriptionStatus,

    pub current_period_start: Option<DateTimeWithTimeZone>,

    pub current_period_end: Option<DateTimeWithTimeZone>,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
