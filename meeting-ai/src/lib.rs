//! Meeting AI abstraction layer for transcription and analysis providers.
//!
//! This crate provides trait-based abstractions for post-meeting workflows:
//! - Speech-to-text transcription with speaker segments
//! - LLM-powered summaries and list extraction
//!
//! The design is provider-agnostic, enabling applications to swap between
//! different service providers (AssemblyAI, Deepgram, OpenAI-compatible chat
//! APIs, etc.) without changing application code.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::Error;
pub use types::transcription::{Segment, Transcription};
