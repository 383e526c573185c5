//! `transcript.generate`: runs speech-to-text over a recording, stores the
//! transcript and queues it for summarization.

use super::context::JobContext;
use super::recording_processor::{mark_recording_failed, snapshot_recording};
use super::{function_ids, unexpected_event};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::Id;
use async_trait::async_trait;
use entity::recording_status::RecordingStatus;
use entity::transcript_status::TranscriptStatus;
use entity_api::{recording, transcript};
use events::{names, Event, RecordingPayload, Step, StepFunction, SummarizePayload};
use log::*;
use meeting_ai::types::transcription::{word_count, Config, Status};
use meeting_ai::Transcription;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

/// Output of the `poll-transcription` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscribedText {
    content: String,
    language: String,
    word_count: i32,
}

pub struct TranscriptGenerator {
    ctx: Arc<JobContext>,
}

impl TranscriptGenerator {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    async fn generate(&self, payload: &RecordingPayload, step: &Step) -> Result<Value, Error> {
        let ctx = self.ctx.as_ref();
        let db = ctx.db();
        let recording_id = payload.recording_id;
        let meeting_id = payload.meeting_id;

        let snapshot = snapshot_recording(db, step, recording_id).await?;
        if snapshot.is_duplicate_delivery() {
            info!(
                "Recording {recording_id} is already {}, skipping duplicate transcription",
                snapshot.status
            );
            return Ok(snapshot.skipped());
        }

        let media_url = payload.file_url.clone();
        let language = ctx.settings.transcript_language.clone();
        let hint = language.clone();
        let job_id: String = step
            .run("submit-transcription", || async move {
                let config = Config {
                    media_url,
                    language_code: Some(hint),
                    enable_speaker_labels: true,
                    ..Default::default()
                };
                let job_id = ctx
                    .external("transcription submit", ctx.transcription.submit(config))
                    .await?;
                debug!(
                    "Submitted recording {recording_id} to {} as job {job_id}",
                    ctx.transcription.provider_id()
                );
                Ok::<_, Error>(job_id)
            })
            .await?;

        let transcribed: TranscribedText = step
            .run("poll-transcription", || async move {
                let result = wait_for_transcription(ctx, &job_id).await?;
                let content = ctx.transcription.format(&result);
                let words = word_count(&content);

                debug!(
                    "{} transcribed recording {recording_id}: {words} words",
                    ctx.transcription.provider_id()
                );

                Ok::<_, Error>(TranscribedText {
                    content,
                    language: result.language_code.unwrap_or(language),
                    word_count: i32::try_from(words).unwrap_or(i32::MAX),
                })
            })
            .await?;

        let word_count = transcribed.word_count;
        let transcript_id: Id = step
            .run("save-transcript", || async move {
                let transcript = transcript::create(
                    db,
                    transcript::NewTranscript {
                        meeting_id,
                        recording_id,
                        content: transcribed.content,
                        language: transcribed.language,
                        word_count: transcribed.word_count,
                        status: TranscriptStatus::Ready,
                    },
                )
                .await?;
                Ok::<_, Error>(transcript.id)
            })
            .await?;

        step.run("mark-recording-ready", || async move {
            recording::update_status(db, recording_id, RecordingStatus::Ready).await?;
            Ok::<_, Error>(())
        })
        .await?;

        let sender = Arc::clone(&ctx.events);
        let next = Event::MeetingSummarize(SummarizePayload {
            transcript_id,
            meeting_id,
        });
        step.run("emit-meeting-summarize", || async move {
            Ok::<_, Error>(sender.send(next).await?)
        })
        .await?;

        info!(
            "Transcript {transcript_id} ({word_count} words) ready for recording {recording_id} of meeting {meeting_id}"
        );

        Ok(json!({
            "transcriptId": transcript_id,
            "wordCount": word_count,
        }))
    }

    /// Error path: the meeting's latest transcript, if still in progress, and
    /// the recording both end up `failed`.
    async fn mark_failed(&self, payload: &RecordingPayload) {
        let db = self.ctx.db();

        match transcript::find_latest_by_meeting_id(db, payload.meeting_id).await {
            Ok(Some(latest)) if latest.status.can_transition_to(TranscriptStatus::Failed) => {
                if let Err(err) =
                    transcript::update_status(db, latest.id, TranscriptStatus::Failed).await
                {
                    error!("Failed to mark transcript {} as failed: {err}", latest.id);
                }
            }
            Ok(_) => {}
            Err(err) => error!(
                "Failed to look up the transcript of meeting {}: {err}",
                payload.meeting_id
            ),
        }

        mark_recording_failed(db, payload.recording_id).await;
    }
}

/// Polls a submitted job until the provider reports a terminal status. Each
/// status check is bounded by the external call timeout and the whole wait by
/// the transcription timeout.
async fn wait_for_transcription(ctx: &JobContext, job_id: &str) -> Result<Transcription, Error> {
    let deadline = Instant::now() + ctx.settings.transcription_timeout;

    loop {
        let transcription = ctx
            .external("transcription status", ctx.transcription.fetch(job_id))
            .await?;

        match transcription.status {
            Status::Completed => return Ok(transcription),
            Status::Failed => {
                let message = transcription
                    .error_message
                    .unwrap_or_else(|| "transcription failed".to_string());
                return Err(meeting_ai::Error::Provider(message).into());
            }
            Status::Queued | Status::Processing => {}
        }

        if Instant::now() + ctx.settings.transcription_poll_interval > deadline {
            warn!(
                "Transcription job {job_id} did not finish within {:?}",
                ctx.settings.transcription_timeout
            );
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Timeout),
            });
        }

        trace!("Transcription job {job_id} is {:?}, polling again", transcription.status);
        tokio::time::sleep(ctx.settings.transcription_poll_interval).await;
    }
}

#[async_trait]
impl StepFunction for TranscriptGenerator {
    fn id(&self) -> &'static str {
        function_ids::TRANSCRIPT_GENERATOR
    }

    fn trigger(&self) -> &'static str {
        names::TRANSCRIPT_GENERATE
    }

    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, events::Error> {
        let Event::TranscriptGenerate(payload) = event else {
            return Err(unexpected_event(self.id(), event));
        };

        match self.generate(payload, step).await {
            Ok(output) => Ok(output),
            Err(err) => {
                error!(
                    "Failed to generate transcript for recording {} of meeting {}: {err}",
                    payload.recording_id, payload.meeting_id
                );
                self.mark_failed(payload).await;
                Err(err.non_retryable())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::context::JobSettings;
    use crate::jobs::testing::{test_settings, HangingOnceSender, Harness};
    use std::time::Duration;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn generate_saves_a_ready_transcript_and_emits_summarize() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness
            .transcription
            .succeed_with_text("привет как дела");

        let output = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap();

        assert_eq!(output["wordCount"], 3);
        let saved = transcript::find_latest_by_meeting_id(harness.db(), fixture.meeting_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.status, TranscriptStatus::Ready);
        assert_eq!(saved.content, "привет как дела");
        assert_eq!(saved.language, "ru");
        assert_eq!(saved.word_count, 3);
        assert_eq!(output["transcriptId"], saved.id.to_string());

        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Ready);

        assert_eq!(
            harness.bus.sent_named(names::MEETING_SUMMARIZE).await,
            vec![Event::MeetingSummarize(SummarizePayload {
                transcript_id: saved.id,
                meeting_id: fixture.meeting_id,
            })]
        );
        assert_eq!(
            harness.transcription.requests(),
            vec![(fixture.file_url.clone(), Some("ru".to_string()))]
        );
    }

    #[tokio::test]
    async fn speaker_segments_become_labelled_lines() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness.transcription.succeed_with_segments(&[
            ("A", "Добрый день"),
            ("B", "Здравствуйте, начнём"),
        ]);

        let output = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap();

        let saved = transcript::find_latest_by_meeting_id(harness.db(), fixture.meeting_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            saved.content,
            "Speaker A: Добрый день\nSpeaker B: Здравствуйте, начнём"
        );
        // Lines are joined with a newline, which is not a word boundary.
        assert_eq!(output["wordCount"], 7);
        assert_eq!(saved.word_count, 7);
    }

    #[tokio::test]
    async fn empty_transcription_has_zero_words() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness.transcription.succeed_with_text("   ");

        let output = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap();

        assert_eq!(output["wordCount"], 0);
    }

    #[tokio::test]
    async fn transcription_failure_marks_the_recording_failed() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness.transcription.fail_with_provider_error("media unreadable");

        let err = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Failed);
        assert!(
            transcript::find_latest_by_meeting_id(harness.db(), fixture.meeting_id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(harness.bus.sent_named(names::MEETING_SUMMARIZE).await.is_empty());
    }

    #[tokio::test]
    async fn failure_flips_an_in_progress_transcript_of_the_meeting() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        let in_progress = transcript::create(
            harness.db(),
            transcript::NewTranscript {
                meeting_id: fixture.meeting_id,
                recording_id: fixture.recording_id,
                content: String::new(),
                language: "ru".to_string(),
                word_count: 0,
                status: TranscriptStatus::Processing,
            },
        )
        .await
        .unwrap();
        harness.transcription.fail_with_provider_error("media unreadable");

        harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap_err();

        let stored = transcript::find_by_id(harness.db(), in_progress.id)
            .await
            .unwrap();
        assert_eq!(stored.status, TranscriptStatus::Failed);
    }

    #[tokio::test]
    async fn a_hung_status_check_fails_the_run() {
        let harness = Harness::with_external_timeout(Duration::from_millis(20)).await;
        let fixture = harness.seed_recording().await;
        harness.transcription.hang();

        let err = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Failed);
    }

    #[tokio::test]
    async fn a_crash_after_saving_resumes_without_transcribing_again() {
        let hanging = Arc::new(HangingOnceSender::new());
        let harness = Harness::with_sender(hanging.clone()).await;
        let fixture = harness.seed_recording().await;
        harness.transcription.succeed_with_text("раз два три четыре");
        let run_id = Id::new_v4();
        let event = Event::TranscriptGenerate(fixture.payload());

        // The first attempt stalls while emitting `meeting.summarize`, the last step.
        let first = tokio::time::timeout(
            Duration::from_millis(200),
            harness.run_with_id(run_id, event.clone()),
        )
        .await;
        assert!(first.is_err());

        let output = harness.run_with_id(run_id, event).await.unwrap();

        assert_eq!(harness.transcription.calls(), 1);
        let transcripts: Vec<_> = entity_api::transcripts::Entity::find()
            .all(harness.db())
            .await
            .unwrap();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(output["transcriptId"], transcripts[0].id.to_string());
        assert_eq!(hanging.delivered(names::MEETING_SUMMARIZE).await, 1);
    }

    #[tokio::test]
    async fn a_long_running_job_outlasts_the_per_call_timeout() {
        let harness = Harness::with_settings(JobSettings {
            external_call_timeout: Duration::from_millis(20),
            transcription_poll_interval: Duration::from_millis(10),
            ..test_settings()
        })
        .await;
        let fixture = harness.seed_recording().await;
        harness.transcription.succeed_with_text("раз два три");
        harness.transcription.processing_for(5);

        let output = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap();

        assert_eq!(output["wordCount"], 3);
        assert_eq!(harness.transcription.calls(), 1);
        assert_eq!(harness.transcription.fetches(), 6);
    }

    #[tokio::test]
    async fn a_job_past_the_transcription_timeout_fails_the_run() {
        let harness = Harness::with_settings(JobSettings {
            transcription_poll_interval: Duration::from_millis(5),
            transcription_timeout: Duration::from_millis(30),
            ..test_settings()
        })
        .await;
        let fixture = harness.seed_recording().await;
        harness.transcription.processing_for(usize::MAX);

        let err = harness
            .run(Event::TranscriptGenerate(fixture.payload()))
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Failed);
    }

    #[tokio::test]
    async fn a_crash_while_polling_resumes_without_submitting_again() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness.transcription.hang();
        let run_id = Id::new_v4();
        let event = Event::TranscriptGenerate(fixture.payload());

        let first = tokio::time::timeout(
            Duration::from_millis(100),
            harness.run_with_id(run_id, event.clone()),
        )
        .await;
        assert!(first.is_err());

        harness.transcription.succeed_with_text("раз два");
        let output = harness.run_with_id(run_id, event).await.unwrap();

        assert_eq!(output["wordCount"], 2);
        assert_eq!(harness.transcription.calls(), 1);
        assert_eq!(harness.transcription.fetches(), 2);
    }
}
