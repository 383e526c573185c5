//! Chat completions client used for meeting summaries and list extraction.
//!
//! Works against any OpenAI-compatible `/chat/completions` endpoint. List
//! extractions ask the model for a JSON array of strings.

use crate::error::Error;
use crate::gateway::assembly_ai::error_for_status;
use crate::gateway::{required_secret, secret_header};
use async_trait::async_trait;
use log::*;
use meeting_ai::traits::analysis::Provider;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use service::config::Config;

const SUMMARY_PROMPT: &str = "You summarize meeting transcripts. Write a concise summary \
of the meeting in the language of the transcript. Answer with the summary text only.";

const KEY_POINTS_PROMPT: &str = "You extract the key points discussed in a meeting transcript. \
Answer with a JSON array of short strings in the language of the transcript and nothing else. \
Answer [] if there are none.";

const ACTION_ITEMS_PROMPT: &str = "You extract action items (tasks someone agreed to do) from a \
meeting transcript. Answer with a JSON array of short strings in the language of the transcript \
and nothing else. Answer [] if there are none.";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &SecretString, base_url: &str, model: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            secret_header("Bearer ", api_key)?,
        );

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let api_key = required_secret("LLM API key", config.llm_api_key())?;
        Self::new(&api_key, config.llm_base_url(), config.llm_model())
    }

    /// Runs one system prompt against the transcript and returns the reply text
    async fn complete(&self, system: &str, transcript: &str) -> Result<String, meeting_ai::Error> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: transcript,
                },
            ],
            temperature: 0.2,
        };

        debug!(
            "Requesting chat completion from {} ({} transcript chars)",
            self.model,
            transcript.len()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to call chat completions: {:?}", e);
                if e.is_timeout() {
                    meeting_ai::Error::Timeout(e.to_string())
                } else {
                    meeting_ai::Error::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse chat completion response: {:?}", e);
            meeting_ai::Error::Deserialization(e.to_string())
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| meeting_ai::Error::Provider("Chat completion had no content".to_string()))
    }

    async fn extract_list(
        &self,
        system: &str,
        transcript: &str,
    ) -> Result<Vec<String>, meeting_ai::Error> {
        let reply = self.complete(system, transcript).await?;
        parse_string_list(&reply).map_err(|e| {
            warn!("Model reply is not a JSON array of strings: {e}, reply: {reply}");
            e
        })
    }
}

/// Parses a JSON array of strings, tolerating a surrounding Markdown code fence.
/// Blank entries are dropped.
fn parse_string_list(reply: &str) -> Result<Vec<String>, meeting_ai::Error> {
    let body = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let items: Vec<String> = serde_json::from_str(body)?;

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

#[async_trait]
impl Provider for OpenAiClient {
    async fn summarize(&self, transcript: &str) -> Result<String, meeting_ai::Error> {
        self.complete(SUMMARY_PROMPT, transcript).await
    }

    async fn extract_key_points(&self, transcript: &str) -> Result<Vec<String>, meeting_ai::Error> {
        self.extract_list(KEY_POINTS_PROMPT, transcript).await
    }

    async fn extract_action_items(
        &self,
        transcript: &str,
    ) -> Result<Vec<String>, meeting_ai::Error> {
        self.extract_list(ACTION_ITEMS_PROMPT, transcript).await
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}
