//! AssemblyAI API client for transcription services.
//!
//! This module provides an HTTP client for the AssemblyAI transcript API and
//! exposes it as a `meeting_ai` transcription provider: `submit` creates a job
//! with speaker labels enabled and `fetch` reads its current state.

use crate::error::Error;
use crate::gateway::{required_secret, secret_header};
use async_trait::async_trait;
use log::*;
use meeting_ai::traits::transcription::Provider;
use meeting_ai::types::transcription::{Config as TranscriptionConfig, Segment, Status, Transcription};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use service::config::Config;

/// Request to create a new transcription
#[derive(Debug, Serialize)]
pub struct CreateTranscriptRequest {
    pub audio_url: String,
    pub speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

/// Transcript as returned by both the create and the get endpoints
#[derive(Debug, Deserialize)]
pub struct TranscriptResponse {
    pub id: String,
    pub status: TranscriptStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub audio_duration: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transcript processing status
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

/// Utterance (speaker segment) with timing
#[derive(Debug, Deserialize, Clone)]
pub struct Utterance {
    pub text: String,
    pub start: i64,
    pub end: i64,
    pub speaker: String,
}

impl From<TranscriptResponse> for Transcription {
    fn from(response: TranscriptResponse) -> Self {
        let status = match response.status {
            TranscriptStatus::Queued => Status::Queued,
            TranscriptStatus::Processing => Status::Processing,
            TranscriptStatus::Completed => Status::Completed,
            TranscriptStatus::Error => Status::Failed,
        };

        let segments = response
            .utterances
            .unwrap_or_default()
            .into_iter()
            .map(|u| Segment {
                text: u.text,
                speaker: u.speaker,
                start_ms: u.start,
                end_ms: u.end,
            })
            .collect();

        Transcription {
            id: response.id,
            status,
            text: response.text,
            segments,
            language_code: response.language_code,
            duration_seconds: response.audio_duration,
            error_message: response.error,
        }
    }
}

/// AssemblyAI API client
pub struct AssemblyAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl AssemblyAiClient {
    /// Create a new AssemblyAI client with the given API key and base URL
    pub fn new(api_key: &SecretString, base_url: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, secret_header("", api_key)?);

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let api_key = required_secret("AssemblyAI API key", config.assemblyai_api_key())?;
        Self::new(&api_key, config.assemblyai_base_url())
    }

    /// Create a new transcription request
    pub async fn create_transcript(
        &self,
        request: CreateTranscriptRequest,
    ) -> Result<TranscriptResponse, meeting_ai::Error> {
        let url = format!("{}/transcript", self.base_url);

        debug!(
            "Creating AssemblyAI transcript for audio: {}",
            request.audio_url
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to create AssemblyAI transcript: {:?}", e);
                network_error(e)
            })?;

        let transcript = parse_response(response).await?;
        info!("Created AssemblyAI transcript with ID: {}", transcript.id);
        Ok(transcript)
    }

    /// Get the status of a transcript
    pub async fn get_transcript(
        &self,
        transcript_id: &str,
    ) -> Result<TranscriptResponse, meeting_ai::Error> {
        let url = format!("{}/transcript/{}", self.base_url, transcript_id);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Failed to get AssemblyAI transcript: {:?}", e);
            network_error(e)
        })?;

        parse_response(response).await
    }
}

#[async_trait]
impl Provider for AssemblyAiClient {
    async fn submit(&self, config: TranscriptionConfig) -> Result<String, meeting_ai::Error> {
        if config.media_url.is_empty() {
            return Err(meeting_ai::Error::Configuration(
                "media_url must not be empty".to_string(),
            ));
        }

        let transcript = self
            .create_transcript(CreateTranscriptRequest {
                audio_url: config.media_url,
                speaker_labels: config.enable_speaker_labels,
                language_code: config.language_code,
            })
            .await?;

        if transcript.status == TranscriptStatus::Error {
            let message = transcript
                .error
                .unwrap_or_else(|| "transcription failed".to_string());
            error!("AssemblyAI rejected transcript {}: {message}", transcript.id);
            return Err(meeting_ai::Error::Provider(message));
        }

        Ok(transcript.id)
    }

    async fn fetch(&self, job_id: &str) -> Result<Transcription, meeting_ai::Error> {
        let transcript = self.get_transcript(job_id).await?;
        trace!("AssemblyAI transcript {job_id} is {:?}", transcript.status);
        Ok(transcript.into())
    }

    fn provider_id(&self) -> &str {
        "assemblyai"
    }
}

fn network_error(err: reqwest::Error) -> meeting_ai::Error {
    if err.is_timeout() {
        meeting_ai::Error::Timeout(err.to_string())
    } else {
        meeting_ai::Error::Network(err.to_string())
    }
}

/// Maps an HTTP response onto the provider-agnostic error variants.
pub(crate) async fn error_for_status(response: reqwest::Response) -> meeting_ai::Error {
    let status = response.status();
    let retry_after_seconds = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let error_text = response.text().await.unwrap_or_default();
    error!("Provider API {status}: {error_text}");

    match status.as_u16() {
        401 | 403 => meeting_ai::Error::Authentication(error_text),
        404 => meeting_ai::Error::NotFound(error_text),
        429 => meeting_ai::Error::RateLimited {
            retry_after_seconds,
        },
        400..=499 => meeting_ai::Error::Configuration(error_text),
        _ => meeting_ai::Error::Provider(format!("{status}: {error_text}")),
    }
}

async fn parse_response(response: reqwest::Response) -> Result<TranscriptResponse, meeting_ai::Error> {
    if !response.status().is_success() {
        return Err(error_for_status(response).await);
    }

    response.json().await.map_err(|e| {
        warn!("Failed to parse AssemblyAI response: {:?}", e);
        meeting_ai::Error::Deserialization(e.to_string())
    })
}
