//! This module re-exports various items from the `entity_api` crate.
//!
//! The purpose of this re-export is to ensure that consumers of the `domain` crate do not need to
//! directly depend on the `entity_api` crate. The worker binary only sees the domain layer: the
//! job step-functions, the database-backed event bus, and the gateway adapters they call.

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{
    job_events, job_steps, meetings, notifications, recordings, subscriptions,
    transcript_summaries, transcripts, users, Id,
};

pub mod error;
pub mod gateway;
pub mod jobs;
