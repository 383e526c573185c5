//! Types for transcription operations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Processing status of a speech-to-text transcription job.
///
/// Jobs typically progress Queued → Processing → Completed within minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

/// Continuous speech segment (utterance) from a single speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub speaker: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Transcription result as returned by a provider.
///
/// `segments` is empty when speaker labels were not requested or the provider
/// could not separate speakers; `text` then carries the whole transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub id: String,
    pub status: Status,
    pub text: Option<String>,
    pub segments: Vec<Segment>,
    pub language_code: Option<String>,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
}

impl Transcription {
    /// One `Speaker <label>: <text>` line per segment, or the trimmed flat text
    /// when there are no segments.
    pub fn to_plain_text(&self) -> String {
        if self.segments.is_empty() {
            return self.text.as_deref().unwrap_or_default().trim().to_string();
        }

        self.segments
            .iter()
            .map(|s| format!("Speaker {}: {}", s.speaker, s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Configuration for a transcription job.
///
/// Provider_options allow vendor-specific tuning (e.g., custom vocabulary, punctuation).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub media_url: String,
    pub language_code: Option<String>,
    pub enable_speaker_labels: bool,
    pub provider_options: HashMap<String, String>,
}

/// A transcript's word count: the number of pieces of `text` split on single
/// spaces. Newlines and repeated spaces are not collapsed; usage limits are
/// enforced against exactly this count. Empty text has no words.
pub fn word_count(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.split(' ').count()
}
