use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tag of a user-facing notification.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "notification_type")]
pub enum NotificationType {
    /// An upcoming meeting the user owns or was invited to
    #[sea_orm(string_value = "meeting_reminder")]
    MeetingReminder,
    #[sea_orm(string_value = "meeting_invite")]
    MeetingInvite,
    #[sea_orm(string_value = "friend_request")]
    FriendRequest,
    #[sea_orm(string_value = "system")]
    System,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::MeetingReminder => write!(fmt, "meeting_reminder"),
            NotificationType::MeetingInvite => write!(fmt, "meeting_invite"),
            NotificationType::FriendRequest => write!(fmt, "friend_request"),
            NotificationType::System => write!(fmt, "system"),
        }
    }
}
