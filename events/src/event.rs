//! The event contract between pipeline stages.
//!
//! Event names and payload field names are part of the wire format shared with
//! the rest of the application and must not change.

use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire names of every event the pipeline understands.
pub mod names {
    pub const RECORDING_PROCESS: &str = "recording.process";
    pub const TRANSCRIPT_GENERATE: &str = "transcript.generate";
    pub const MEETING_SUMMARIZE: &str = "meeting.summarize";
    pub const MEETING_REMINDER: &str = "meeting.reminder";
    pub const RECORDINGS_CLEANUP: &str = "recordings.cleanup";
    pub const SUBSCRIPTION_SYNC: &str = "subscription.sync";
}

/// Payload shared by `recording.process` and `transcript.generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPayload {
    pub recording_id: Id,
    pub meeting_id: Id,
    pub file_url: String,
}

/// Payload of `meeting.summarize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizePayload {
    pub transcript_id: Id,
    pub meeting_id: Id,
}

/// Payload of `meeting.reminder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub meeting_id: Id,
    pub user_id: Id,
    pub scheduled_at: DateTime<Utc>,
}

/// Payload of `recordings.cleanup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPayload {
    pub older_than_days: u32,
}

/// Payload of `subscription.sync`. `subscription_id` is the billing
/// provider's id for the subscription, not the local row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSyncPayload {
    pub subscription_id: String,
    pub user_id: Id,
}

/// Every event that can be sent on the job bus.
///
/// Serialized adjacently tagged as `{"name": "...", "data": {...}}` so that the
/// name and payload can be stored and transported separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum Event {
    /// A recording file is available and should enter the pipeline.
    #[serde(rename = "recording.process")]
    RecordingProcess(RecordingPayload),
    /// A processing recording should be transcribed.
    #[serde(rename = "transcript.generate")]
    TranscriptGenerate(RecordingPayload),
    /// A ready transcript should be summarized.
    #[serde(rename = "meeting.summarize")]
    MeetingSummarize(SummarizePayload),
    /// A user should be reminded of an upcoming meeting.
    #[serde(rename = "meeting.reminder")]
    MeetingReminder(ReminderPayload),
    /// Recordings older than the given age should be purged.
    #[serde(rename = "recordings.cleanup")]
    RecordingsCleanup(CleanupPayload),
    /// A subscription should be reconciled with the billing provider.
    #[serde(rename = "subscription.sync")]
    SubscriptionSync(SubscriptionSyncPayload),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::RecordingProcess(_) => names::RECORDING_PROCESS,
            Event::TranscriptGenerate(_) => names::TRANSCRIPT_GENERATE,
            Event::MeetingSummarize(_) => names::MEETING_SUMMARIZE,
            Event::MeetingReminder(_) => names::MEETING_REMINDER,
            Event::RecordingsCleanup(_) => names::RECORDINGS_CLEANUP,
            Event::SubscriptionSync(_) => names::SUBSCRIPTION_SYNC,
        }
    }

    /// Serializes just the payload object.
    pub fn payload(&self) -> Result<Value, Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Rebuilds an event from a stored name and payload.
    pub fn from_parts(name: &str, payload: Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(json!({ "name": name, "data": payload }))?)
    }
}

/// Anything that can enqueue events for delivery.
///
/// Delivery is at-least-once: a sent event may reach its step-function more
/// than once, so step-functions guard their side effects.
#[async_trait]
pub trait EventSender: Send + Sync {
    /// Enqueues an event and returns the id of the run that will process it.
    async fn send(&self, event: Event) -> Result<Id, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn recording_process_uses_the_wire_name_and_camel_case_fields() {
        let recording_id = Id::new_v4();
        let meeting_id = Id::new_v4();
        let event = Event::RecordingProcess(RecordingPayload {
            recording_id,
            meeting_id,
            file_url: "https://x/r1.mp4".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["name"], "recording.process");
        assert_eq!(json["data"]["recordingId"], recording_id.to_string());
        assert_eq!(json["data"]["meetingId"], meeting_id.to_string());
        assert_eq!(json["data"]["fileUrl"], "https://x/r1.mp4");
    }

    #[test]
    fn from_parts_rebuilds_a_stored_reminder() {
        let meeting_id = Id::new_v4();
        let user_id = Id::new_v4();
        let scheduled_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let payload = json!({
            "meetingId": meeting_id,
            "userId": user_id,
            "scheduledAt": "2026-03-01T09:30:00Z",
        });

        let event = Event::from_parts(names::MEETING_REMINDER, payload).unwrap();

        assert_eq!(
            event,
            Event::MeetingReminder(ReminderPayload {
                meeting_id,
                user_id,
                scheduled_at,
            })
        );
    }

    #[test]
    fn payload_strips_the_name_tag() {
        let event = Event::RecordingsCleanup(CleanupPayload {
            older_than_days: 30,
        });

        assert_eq!(event.name(), "recordings.cleanup");
        assert_eq!(event.payload().unwrap(), json!({ "olderThanDays": 30 }));
    }

    #[test]
    fn from_parts_rejects_unknown_names() {
        let result = Event::from_parts("recording.explode", json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn subscription_sync_keeps_the_external_id_as_a_string() {
        let payload = json!({ "subscriptionId": "sub_123", "userId": Id::new_v4() });
        let event = Event::from_parts(names::SUBSCRIPTION_SYNC, payload).unwrap();

        match event {
            Event::SubscriptionSync(p) => assert_eq!(p.subscription_id, "sub_123"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
