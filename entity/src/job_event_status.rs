use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery state of a queued job event.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "job_event_status")]
pub enum JobEventStatus {
    /// Waiting for a worker (first delivery or a scheduled retry)
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Claimed by a worker
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Gave up: non-retryable error or attempts exhausted
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl std::fmt::Display for JobEventStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEventStatus::Pending => write!(fmt, "pending"),
            JobEventStatus::Running => write!(fmt, "running"),
            JobEventStatus::Completed => write!(fmt, "completed"),
            JobEventStatus::Failed => write!(fmt, "failed"),
        }
    }
}
