//! AI analysis provider trait.

use crate::Error;
use async_trait::async_trait;

/// Abstraction for LLM-powered meeting transcript analysis.
///
/// Implementations use large language models to condense a transcript into a
/// summary and to pull lists out of it. Supports OpenAI-compatible chat APIs,
/// Anthropic Claude, AssemblyAI LeMUR.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Produce a prose summary of the transcript text.
    async fn summarize(&self, transcript: &str) -> std::result::Result<String, Error>;

    /// Extract the main points discussed. An empty list means none were found.
    async fn extract_key_points(&self, transcript: &str)
        -> std::result::Result<Vec<String>, Error>;

    /// Extract follow-up tasks agreed in the meeting. An empty list means none
    /// were found.
    async fn extract_action_items(
        &self,
        transcript: &str,
    ) -> std::result::Result<Vec<String>, Error>;

    /// Return unique identifier for this provider (e.g., "openai", "claude").
    ///
    /// Used for logging and model-specific logic.
    fn provider_id(&self) -> &str;
}
