pub use entity::{
    job_events, job_steps, meetings, notifications, recordings, subscriptions,
    transcript_summaries, transcripts, users, Id,
};

pub mod error;
pub mod job_event;
pub mod job_step;
pub mod meeting;
pub mod notification;
pub mod recording;
pub mod subscription;
pub mod transcript;
pub mod transcript_summary;
pub mod user;
