//! `meeting.summarize`: condenses a ready transcript into a summary with key
//! points and action items.

use super::context::JobContext;
use super::{function_ids, unexpected_event};
use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use crate::Id;
use async_trait::async_trait;
use entity_api::{transcript, transcript_summary};
use events::{names, Event, Step, StepFunction, SummarizePayload};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Output of the `load-transcript` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadedTranscript {
    content: String,
    /// Set when an earlier delivery already summarized this transcript
    existing_summary_id: Option<Id>,
}

/// Output of the `summarize` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Analysis {
    summary: String,
    key_points: Vec<String>,
    action_items: Vec<String>,
}

pub struct MeetingSummarizer {
    ctx: Arc<JobContext>,
}

impl MeetingSummarizer {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    async fn summarize(&self, payload: &SummarizePayload, step: &Step) -> Result<Value, Error> {
        let ctx = self.ctx.as_ref();
        let db = ctx.db();
        let transcript_id = payload.transcript_id;

        let loaded: LoadedTranscript = step
            .run("load-transcript", || async move {
                let transcript = transcript::find_by_id(db, transcript_id).await?;
                let existing = transcript_summary::find_by_transcript_id(db, transcript_id).await?;
                Ok::<_, Error>(LoadedTranscript {
                    content: transcript.content,
                    existing_summary_id: existing.map(|summary| summary.id),
                })
            })
            .await?;

        if let Some(summary_id) = loaded.existing_summary_id {
            info!("Transcript {transcript_id} already has summary {summary_id}, skipping");
            return Ok(json!({
                "skipped": true,
                "summaryId": summary_id,
            }));
        }

        let content = loaded.content;
        let analysis: Analysis = step
            .run("summarize", || async move {
                let analysis = ctx.analysis.as_ref();
                let summary = ctx
                    .external("summarize", analysis.summarize(&content))
                    .await?;
                let (key_points, action_items) = tokio::try_join!(
                    ctx.external("extract key points", analysis.extract_key_points(&content)),
                    ctx.external(
                        "extract action items",
                        analysis.extract_action_items(&content)
                    ),
                )?;

                debug!(
                    "{} analysed transcript {transcript_id}: {} key points, {} action items",
                    analysis.provider_id(),
                    key_points.len(),
                    action_items.len()
                );

                Ok::<_, Error>(Analysis {
                    summary,
                    key_points,
                    action_items,
                })
            })
            .await?;

        let summary_id: Id = step
            .run("save-summary", || async move {
                let summary = transcript_summary::create(
                    db,
                    transcript_id,
                    analysis.summary,
                    analysis.key_points,
                    analysis.action_items,
                )
                .await?;
                Ok::<_, Error>(summary.id)
            })
            .await?;

        info!(
            "Saved summary {summary_id} for transcript {transcript_id} of meeting {}",
            payload.meeting_id
        );

        Ok(json!({
            "summaryId": summary_id,
            "transcriptId": transcript_id,
        }))
    }
}

#[async_trait]
impl StepFunction for MeetingSummarizer {
    fn id(&self) -> &'static str {
        function_ids::MEETING_SUMMARIZER
    }

    fn trigger(&self) -> &'static str {
        names::MEETING_SUMMARIZE
    }

    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, events::Error> {
        let Event::MeetingSummarize(payload) = event else {
            return Err(unexpected_event(self.id(), event));
        };

        self.summarize(payload, step).await.map_err(|err| {
            error!(
                "Failed to summarize transcript {} of meeting {}: {err}",
                payload.transcript_id, payload.meeting_id
            );
            match err.error_kind {
                // A summarize event for a transcript that does not exist will never succeed.
                DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound)) => {
                    err.non_retryable()
                }
                _ => err.into_function_error(),
            }
        })
    }
}
