//! Transcription provider trait.

use crate::types::transcription::{Config, Transcription};
use crate::Error;
use async_trait::async_trait;

/// Abstraction for speech-to-text transcription services.
///
/// Implementations convert audio/video to text with speaker diarization.
/// Supports AssemblyAI, Deepgram, Whisper.
/// This trait enables provider swapping for cost optimization and feature comparison.
///
/// Jobs are asynchronous on the provider side: `submit` starts one and `fetch`
/// reads its current state, so callers decide how long to wait and can keep the
/// job id across restarts.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Submit the audio/video at `config.media_url` and return the provider's job id.
    async fn submit(&self, config: Config) -> std::result::Result<String, Error>;

    /// Current state of a submitted job. Returns immediately; a job still
    /// queued or processing is reported with a non-terminal status.
    async fn fetch(&self, job_id: &str) -> std::result::Result<Transcription, Error>;

    /// Render a completed transcription as plain text.
    fn format(&self, transcription: &Transcription) -> String {
        transcription.to_plain_text()
    }

    /// Return unique identifier for this provider (e.g., "assemblyai", "deepgram").
    ///
    /// Used for logging and provider selection.
    /// Must be lowercase, alphanumeric with underscores only.
    fn provider_id(&self) -> &str;
}
