//! Job event bus infrastructure for the Shadow meeting pipeline.
//!
//! This crate provides the event contract and the durable step-function model
//! that the pipeline stages communicate through.
//!
//! # Architecture
//!
//! - **Event**: Enum of every named event with its payload (the wire contract)
//! - **EventSender**: Trait for enqueueing events onto a bus
//! - **StepFunction**: Trait for a named unit of work triggered by one event
//! - **Step**: Runs checkpointed steps, skipping those already persisted for a run
//! - **StepStore**: Persistence for step checkpoints keyed by (run id, step id)
//! - **Dispatcher**: Routes an event to the step-functions registered for it
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies. The database-backed bus and step store live
//! in the `domain` crate; in-memory versions live here for tests and local runs.

use uuid::Uuid;

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod memory;
pub mod step;

pub use dispatcher::{Dispatcher, StepFunction};
pub use error::{Error, EventsErrorKind};
pub use event::{
    names, CleanupPayload, Event, EventSender, RecordingPayload, ReminderPayload,
    SubscriptionSyncPayload, SummarizePayload,
};
pub use memory::{InMemoryEventBus, InMemoryStepStore, RunReport};
pub use step::{Step, StepStore};

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = Uuid;
