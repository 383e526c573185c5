use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a meeting recording as it moves through the pipeline.
///
/// A recording only ever moves from `Processing` to one of the two terminal
/// states; see [`RecordingStatus::can_transition_to`].
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "recording_status")]
pub enum RecordingStatus {
    /// The file is being transcribed
    #[sea_orm(string_value = "processing")]
    #[default]
    Processing,
    /// Transcript is available
    #[sea_orm(string_value = "ready")]
    Ready,
    /// Processing failed at some stage
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl RecordingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordingStatus::Ready | RecordingStatus::Failed)
    }

    /// Writing the current status again is allowed and is a no-op.
    pub fn can_transition_to(&self, next: RecordingStatus) -> bool {
        *self == next || *self == RecordingStatus::Processing
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingStatus::Processing => write!(fmt, "processing"),
            RecordingStatus::Ready => write!(fmt, "ready"),
            RecordingStatus::Failed => write!(fmt, "failed"),
        }
    }
}
