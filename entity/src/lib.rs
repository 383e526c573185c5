use uuid::Uuid;

// Meeting domain entities
pub mod meeting_status;
pub mod meetings;
pub mod notification_type;
pub mod notifications;
pub mod recording_status;
pub mod recordings;
pub mod subscription_plan;
pub mod subscription_status;
pub mod subscriptions;
pub mod transcript_status;
pub mod transcript_summaries;
pub mod transcripts;
pub mod users;

// Job pipeline entities
pub mod job_event_status;
pub mod job_events;
pub mod job_steps;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
