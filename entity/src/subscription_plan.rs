use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription tier determining usage limits.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_plan")]
pub enum SubscriptionPlan {
    #[sea_orm(string_value = "free")]
    #[default]
    Free,
    #[sea_orm(string_value = "pro")]
    Pro,
    #[sea_orm(string_value = "enterprise")]
    Enterprise,
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionPlan::Free => write!(fmt, "free"),
            SubscriptionPlan::Pro => write!(fmt, "pro"),
            SubscriptionPlan::Enterprise => write!(fmt, "enterprise"),
        }
    }
}
