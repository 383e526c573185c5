//! `recording.process`: admits a newly uploaded recording into the pipeline
//! and hands it on to transcription.

use super::context::JobContext;
use super::{function_ids, unexpected_event};
use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use entity::recording_status::RecordingStatus;
use entity_api::{recording, transcript};
use events::{names, Event, RecordingPayload, Step, StepFunction};
use log::*;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Status of a recording when a run first looked at it, and its ready
/// transcript if one had already been saved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordingSnapshot {
    pub recording_id: Id,
    pub status: RecordingStatus,
    #[serde(default)]
    pub transcript_id: Option<Id>,
}

impl RecordingSnapshot {
    /// A terminal recording, or one that already has a ready transcript, on a
    /// fresh run means the event was delivered again after an earlier run got
    /// past transcription.
    ///
    /// Runs are checked one at a time: two deliveries loaded before either
    /// saves a transcript both carry on.
    pub fn is_duplicate_delivery(&self) -> bool {
        self.status.is_terminal() || self.transcript_id.is_some()
    }

    pub fn skipped(&self) -> Value {
        json!({
            "skipped": true,
            "recordingId": self.recording_id,
            "status": self.status,
            "transcriptId": self.transcript_id,
        })
    }
}

/// Checkpointed `load-recording` step shared by the recording stages.
pub(crate) async fn snapshot_recording(
    db: &DatabaseConnection,
    step: &Step,
    recording_id: Id,
) -> Result<RecordingSnapshot, Error> {
    step.run("load-recording", || async move {
        let recording = recording::find_by_id(db, recording_id).await?;
        let transcript_id = transcript::find_ready_by_recording_id(db, recording_id)
            .await?
            .map(|t| t.id);
        Ok::<_, Error>(RecordingSnapshot {
            recording_id,
            status: recording.status,
            transcript_id,
        })
    })
    .await
}

/// Moves a recording to `failed` on a run's error path. Failures here are
/// logged and otherwise ignored so the original error is the one reported.
pub(crate) async fn mark_recording_failed(db: &DatabaseConnection, recording_id: Id) {
    match recording::update_status(db, recording_id, RecordingStatus::Failed).await {
        Ok(_) => info!("Marked recording {recording_id} as failed"),
        Err(err) => error!("Failed to mark recording {recording_id} as failed: {err}"),
    }
}

pub struct RecordingProcessor {
    ctx: Arc<JobContext>,
}

impl RecordingProcessor {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    async fn process(&self, payload: &RecordingPayload, step: &Step) -> Result<Value, Error> {
        let db = self.ctx.db();
        let recording_id = payload.recording_id;

        let snapshot = snapshot_recording(db, step, recording_id).await?;
        if snapshot.is_duplicate_delivery() {
            info!(
                "Recording {recording_id} is already {}, skipping duplicate delivery",
                snapshot.status
            );
            return Ok(snapshot.skipped());
        }

        step.run("mark-processing", || async move {
            recording::update_status(db, recording_id, RecordingStatus::Processing).await?;
            Ok::<_, Error>(())
        })
        .await?;

        let sender = Arc::clone(&self.ctx.events);
        let next = Event::TranscriptGenerate(payload.clone());
        let transcript_run_id: Id = step
            .run("emit-transcript-generate", || async move {
                Ok::<_, Error>(sender.send(next).await?)
            })
            .await?;

        info!(
            "Recording {recording_id} of meeting {} queued for transcription (run {transcript_run_id})",
            payload.meeting_id
        );

        Ok(json!({
            "recordingId": recording_id,
            "status": RecordingStatus::Processing,
        }))
    }
}

#[async_trait]
impl StepFunction for RecordingProcessor {
    fn id(&self) -> &'static str {
        function_ids::RECORDING_PROCESSOR
    }

    fn trigger(&self) -> &'static str {
        names::RECORDING_PROCESS
    }

    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, events::Error> {
        let Event::RecordingProcess(payload) = event else {
            return Err(unexpected_event(self.id(), event));
        };

        debug!(
            "Processing recording {} of meeting {} from {}",
            payload.recording_id, payload.meeting_id, payload.file_url
        );

        match self.process(payload, step).await {
            Ok(output) => Ok(output),
            Err(err) => {
                error!(
                    "Failed to process recording {} of meeting {}: {err}",
                    payload.recording_id, payload.meeting_id
                );
                mark_recording_failed(self.ctx.db(), payload.recording_id).await;
                Err(err.non_retryable())
            }
        }
    }
}
