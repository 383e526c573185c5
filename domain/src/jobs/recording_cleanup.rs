//! `recordings.cleanup`: purges recordings past their retention age, media
//! files first and database rows after.

use super::context::JobContext;
use super::{function_ids, unexpected_event};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use entity_api::recording;
use events::{names, CleanupPayload, Event, Step, StepFunction};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpiredRecordings {
    cutoff: DateTime<Utc>,
    recording_ids: Vec<Id>,
    file_urls: Vec<String>,
}

/// Recordings created before this instant have expired.
fn cutoff(now: DateTime<Utc>, older_than_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(older_than_days))
}

pub struct ExpiredRecordingCleaner {
    ctx: Arc<JobContext>,
}

impl ExpiredRecordingCleaner {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    async fn clean(&self, payload: &CleanupPayload, step: &Step) -> Result<Value, Error> {
        let ctx = self.ctx.as_ref();
        let db = ctx.db();
        let older_than_days = payload.older_than_days;

        let expired: ExpiredRecordings = step
            .run("find-expired", || async move {
                let cutoff = cutoff(Utc::now(), older_than_days);
                let recordings = recording::find_created_before(db, cutoff.into()).await?;

                let file_urls = recordings
                    .iter()
                    .filter_map(|r| r.file_url.as_deref())
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect();

                Ok::<_, Error>(ExpiredRecordings {
                    cutoff,
                    recording_ids: recordings.into_iter().map(|r| r.id).collect(),
                    file_urls,
                })
            })
            .await?;

        if expired.recording_ids.is_empty() {
            debug!("No recordings created before {}", expired.cutoff);
            return Ok(json!({
                "deletedFiles": 0,
                "deletedRecordings": 0,
                "cutoff": expired.cutoff,
            }));
        }

        let file_urls = expired.file_urls;
        let deleted_files: usize = step
            .run("delete-files", || async move {
                if file_urls.is_empty() {
                    return Ok::<_, Error>(0);
                }

                let result = ctx
                    .external("delete files", ctx.storage.delete_files(&file_urls))
                    .await?;
                if !result.success {
                    warn!(
                        "Storage rejected deletion of {} expired recording files",
                        file_urls.len()
                    );
                    return Err(Error {
                        source: None,
                        error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                            "Storage reported the batch deletion as failed".to_string(),
                        )),
                    });
                }
                Ok(result.deleted_count)
            })
            .await?;

        let recording_ids = expired.recording_ids;
        let deleted_recordings: usize = step
            .run("delete-rows", || async move {
                for id in &recording_ids {
                    recording::delete_by_id(db, *id).await?;
                }
                Ok::<_, Error>(recording_ids.len())
            })
            .await?;

        info!(
            "Deleted {deleted_recordings} recordings and {deleted_files} files created before {}",
            expired.cutoff
        );

        Ok(json!({
            "deletedFiles": deleted_files,
            "deletedRecordings": deleted_recordings,
            "cutoff": expired.cutoff,
        }))
    }
}

#[async_trait]
impl StepFunction for ExpiredRecordingCleaner {
    fn id(&self) -> &'static str {
        function_ids::RECORDING_CLEANUP
    }

    fn trigger(&self) -> &'static str {
        names::RECORDINGS_CLEANUP
    }

    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, events::Error> {
        let Event::RecordingsCleanup(payload) = event else {
            return Err(unexpected_event(self.id(), event));
        };

        self.clean(payload, step).await.map_err(|err| {
            error!(
                "Failed to clean up recordings older than {} days: {err}",
                payload.older_than_days
            );
            err.into_function_error()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::Harness;
    use chrono::TimeZone;
    use entity_api::{transcript, transcripts};
    use sea_orm::{EntityTrait, PaginatorTrait};

    fn cleanup(older_than_days: u32) -> Event {
        Event::RecordingsCleanup(CleanupPayload { older_than_days })
    }

    #[test]
    fn cutoff_subtracts_whole_days() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            cutoff(now, 30),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(cutoff(now, 0), now);
    }

    #[tokio::test]
    async fn clean_deletes_files_then_rows_of_expired_recordings() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        let old = harness
            .seed_recording_aged(fixture.meeting_id, Some("https://utfs.io/f/old.mp4"), 40)
            .await;
        let old_without_file = harness
            .seed_recording_aged(fixture.meeting_id, None, 45)
            .await;

        let output = harness.run(cleanup(30)).await.unwrap();

        assert_eq!(output["deletedFiles"], 1);
        assert_eq!(output["deletedRecordings"], 2);
        assert_eq!(
            harness.storage.batches(),
            vec![vec!["https://utfs.io/f/old.mp4".to_string()]]
        );
        for id in [old, old_without_file] {
            assert!(recording::find_by_id(harness.db(), id).await.is_err());
        }
        assert!(recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn deleting_a_recording_cascades_to_its_transcripts() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        let old = harness
            .seed_recording_aged(fixture.meeting_id, Some("https://utfs.io/f/old.mp4"), 40)
            .await;
        transcript::create(
            harness.db(),
            transcript::NewTranscript {
                meeting_id: fixture.meeting_id,
                recording_id: old,
                content: "старая запись".to_string(),
                language: "ru".to_string(),
                word_count: 2,
                status: entity::transcript_status::TranscriptStatus::Ready,
            },
        )
        .await
        .unwrap();

        harness.run(cleanup(30)).await.unwrap();

        let remaining = transcripts::Entity::find()
            .count(harness.db())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn nothing_expired_makes_no_storage_call() {
        let harness = Harness::new().await;
        harness.seed_recording().await;

        let output = harness.run(cleanup(30)).await.unwrap();

        assert_eq!(output["deletedRecordings"], 0);
        assert!(harness.storage.batches().is_empty());
    }

    #[tokio::test]
    async fn a_failed_storage_batch_keeps_every_row() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        let old = harness
            .seed_recording_aged(fixture.meeting_id, Some("https://utfs.io/f/old.mp4"), 40)
            .await;
        harness.storage.report_failure();

        let err = harness.run(cleanup(30)).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(recording::find_by_id(harness.db(), old).await.is_ok());
    }

    #[tokio::test]
    async fn a_storage_error_keeps_every_row_until_the_retry() {
        let harness = Harness::new().await;
        let fixture = harness.seed_recording().await;
        let old = harness
            .seed_recording_aged(fixture.meeting_id, Some("https://utfs.io/f/old.mp4"), 40)
            .await;
        let older = harness
            .seed_recording_aged(fixture.meeting_id, Some("https://utfs.io/f/older.mp4"), 60)
            .await;
        harness.storage.fail_next();
        let run_id = Id::new_v4();

        let err = harness.run_with_id(run_id, cleanup(30)).await.unwrap_err();
        assert!(err.is_retryable());
        for id in [old, older, fixture.recording_id] {
            assert!(recording::find_by_id(harness.db(), id).await.is_ok());
        }

        let output = harness.run_with_id(run_id, cleanup(30)).await.unwrap();

        assert_eq!(output["deletedFiles"], 2);
        assert_eq!(output["deletedRecordings"], 2);
        assert!(recording::find_by_id(harness.db(), old).await.is_err());
        assert!(recording::find_by_id(harness.db(), older).await.is_err());
        assert!(recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .is_ok());
    }
}
