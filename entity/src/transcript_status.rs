use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a transcript through its lifecycle.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "transcript_status")]
pub enum TranscriptStatus {
    #[sea_orm(string_value = "processing")]
    #[default]
    Processing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl TranscriptStatus {
    /// Same rule as recordings: only `Processing` may change.
    pub fn can_transition_to(&self, next: TranscriptStatus) -> bool {
        *self == next || *self == TranscriptStatus::Processing
    }
}

impl std::fmt::Display for TranscriptStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptStatus::Processing => write!(fmt, "processing"),
            TranscriptStatus::Ready => write!(fmt, "ready"),
            TranscriptStatus::Failed => write!(fmt, "failed"),
        }
    }
}
