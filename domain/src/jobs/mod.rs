//! Step-functions of the background pipeline and the database-backed bus
//! that delivers events to them.
//!
//! ```text
//! recording.process -> transcript.generate -> meeting.summarize
//! meeting.reminder    recordings.cleanup    subscription.sync
//! ```

use events::{Dispatcher, Event, EventsErrorKind};
use std::sync::Arc;

pub mod context;
pub mod meeting_reminder;
pub mod meeting_summarizer;
pub mod queue;
pub mod recording_cleanup;
pub mod recording_processor;
pub mod subscription_sync;
pub mod transcript_generator;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{JobContext, JobSettings};
pub use meeting_reminder::MeetingReminderSender;
pub use meeting_summarizer::MeetingSummarizer;
pub use queue::{DatabaseEventBus, DatabaseStepStore, RunOutcome, Worker, WorkerSettings};
pub use recording_cleanup::ExpiredRecordingCleaner;
pub use recording_processor::RecordingProcessor;
pub use subscription_sync::SubscriptionSynchronizer;
pub use transcript_generator::TranscriptGenerator;

/// Function ids. They namespace step checkpoints, so renaming one orphans the
/// checkpoints of runs in flight.
pub mod function_ids {
    pub const RECORDING_PROCESSOR: &str = "recording-processor";
    pub const TRANSCRIPT_GENERATOR: &str = "transcript-generator";
    pub const MEETING_SUMMARIZER: &str = "meeting-summarizer";
    pub const MEETING_REMINDER: &str = "meeting-reminder";
    pub const RECORDING_CLEANUP: &str = "recording-cleanup";
    pub const SUBSCRIPTION_SYNC: &str = "subscription-sync";
}

/// A dispatcher with every pipeline step-function registered.
pub fn dispatcher(ctx: Arc<JobContext>) -> Dispatcher {
    Dispatcher::new()
        .with_function(Arc::new(RecordingProcessor::new(Arc::clone(&ctx))))
        .with_function(Arc::new(TranscriptGenerator::new(Arc::clone(&ctx))))
        .with_function(Arc::new(MeetingSummarizer::new(Arc::clone(&ctx))))
        .with_function(Arc::new(MeetingReminderSender::new(Arc::clone(&ctx))))
        .with_function(Arc::new(ExpiredRecordingCleaner::new(Arc::clone(&ctx))))
        .with_function(Arc::new(SubscriptionSynchronizer::new(ctx)))
}

/// Error for an event routed to a function that does not handle it.
pub(crate) fn unexpected_event(function_id: &str, event: &Event) -> events::Error {
    log::error!("{function_id} received unexpected event {}", event.name());
    events::Error {
        source: None,
        error_kind: EventsErrorKind::UnknownEvent(event.name().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity::recording_status::RecordingStatus;
    use entity::transcript_status::TranscriptStatus;
    use entity_api::{recording, transcript, transcript_summary, transcript_summaries};
    use events::{names, EventSender};
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn every_event_has_exactly_one_function() {
        let harness = testing::Harness::new().await;
        let dispatcher = harness.dispatcher();

        for name in [
            names::RECORDING_PROCESS,
            names::TRANSCRIPT_GENERATE,
            names::MEETING_SUMMARIZE,
            names::MEETING_REMINDER,
            names::RECORDINGS_CLEANUP,
            names::SUBSCRIPTION_SYNC,
        ] {
            assert_eq!(dispatcher.function_ids_for(name).len(), 1, "{name}");
        }
    }

    #[tokio::test]
    async fn an_uploaded_recording_ends_up_transcribed_and_summarized() {
        let harness = testing::Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness.transcription.succeed_with_text("Обсудили релиз и сроки");

        harness
            .bus
            .send(Event::RecordingProcess(fixture.payload()))
            .await
            .unwrap();
        let reports = harness.drain().await;

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.result.is_ok()));

        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Ready);

        let saved = transcript::find_latest_by_meeting_id(harness.db(), fixture.meeting_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.status, TranscriptStatus::Ready);
        assert_eq!(saved.word_count, 4);

        assert_eq!(harness.bus.sent_named(names::MEETING_SUMMARIZE).await.len(), 1);
        assert!(transcript_summary::find_by_transcript_id(harness.db(), saved.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn duplicate_uploads_produce_one_summary() {
        let harness = testing::Harness::new().await;
        let fixture = harness.seed_recording().await;

        for _ in 0..2 {
            harness
                .bus
                .send(Event::RecordingProcess(fixture.payload()))
                .await
                .unwrap();
        }
        harness.drain().await;

        assert_eq!(harness.transcription.calls(), 1);
        assert_eq!(harness.bus.sent_named(names::MEETING_SUMMARIZE).await.len(), 1);
        let summaries = transcript_summaries::Entity::find()
            .count(harness.db())
            .await
            .unwrap();
        assert_eq!(summaries, 1);
    }

    #[tokio::test]
    async fn a_failed_transcription_stops_the_pipeline() {
        let harness = testing::Harness::new().await;
        let fixture = harness.seed_recording().await;
        harness.transcription.fail_with_provider_error("unsupported codec");

        harness
            .bus
            .send(Event::RecordingProcess(fixture.payload()))
            .await
            .unwrap();
        let reports = harness.drain().await;

        assert_eq!(reports.len(), 2);
        assert!(reports[0].result.is_ok());
        assert!(reports[1].result.is_err());
        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Failed);
        assert!(harness.bus.sent_named(names::MEETING_SUMMARIZE).await.is_empty());
        assert_eq!(harness.analysis.calls(), 0);
    }

    #[tokio::test]
    async fn a_worker_drives_the_pipeline_through_the_database_queue() {
        let harness = testing::Harness::with_database_bus().await;
        let fixture = harness.seed_recording().await;
        let worker = Worker::new(
            Arc::clone(&harness.db),
            harness.dispatcher(),
            WorkerSettings::default(),
        );

        harness
            .ctx
            .events
            .send(Event::RecordingProcess(fixture.payload()))
            .await
            .unwrap();

        let mut completed = 0;
        while let Some(outcome) = worker.run_once().await.unwrap() {
            assert!(matches!(outcome, RunOutcome::Completed { .. }), "{outcome:?}");
            completed += 1;
        }

        assert_eq!(completed, 3);
        let recording = recording::find_by_id(harness.db(), fixture.recording_id)
            .await
            .unwrap();
        assert_eq!(recording.status, RecordingStatus::Ready);
        let summaries = transcript_summaries::Entity::find()
            .count(harness.db())
            .await
            .unwrap();
        assert_eq!(summaries, 1);
    }
}
