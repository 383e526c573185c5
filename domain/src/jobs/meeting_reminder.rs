//! `meeting.reminder`: tells a user about an upcoming meeting, in-app and by
//! email when the user has an address.

use super::context::JobContext;
use super::{function_ids, unexpected_event};
use crate::error::Error;
use crate::gateway::MeetingReminderEmail;
use crate::Id;
use async_trait::async_trait;
use entity::notification_type::NotificationType;
use entity_api::{meeting, notification, user};
use events::{names, Event, ReminderPayload, Step, StepFunction};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Display name used in emails when the user never set one.
const DEFAULT_DISPLAY_NAME: &str = "User";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeetingInfo {
    title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Recipient {
    email: Option<String>,
    name: Option<String>,
}

fn not_found(reason: &str) -> Value {
    json!({ "success": false, "reason": reason })
}

pub struct MeetingReminderSender {
    ctx: Arc<JobContext>,
}

impl MeetingReminderSender {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    async fn remind(&self, payload: &ReminderPayload, step: &Step) -> Result<Value, Error> {
        let ctx = self.ctx.as_ref();
        let db = ctx.db();
        let meeting_id = payload.meeting_id;
        let user_id = payload.user_id;

        let meeting: Option<MeetingInfo> = step
            .run("load-meeting", || async move {
                let meeting = meeting::find_by_id(db, meeting_id).await?;
                Ok::<_, Error>(meeting.map(|m| MeetingInfo { title: m.title }))
            })
            .await?;
        let Some(meeting) = meeting else {
            warn!("Meeting {meeting_id} not found, dropping reminder for user {user_id}");
            return Ok(not_found("Meeting not found"));
        };

        let recipient: Option<Recipient> = step
            .run("load-user", || async move {
                let user = user::find_by_id(db, user_id).await?;
                Ok::<_, Error>(user.map(|u| Recipient {
                    email: u.email,
                    name: u.name,
                }))
            })
            .await?;
        let Some(recipient) = recipient else {
            warn!("User {user_id} not found, dropping reminder for meeting {meeting_id}");
            return Ok(not_found("User not found"));
        };

        let metadata = json!({
            "meetingId": meeting_id,
            "meetingTitle": meeting.title,
            "scheduledAt": payload.scheduled_at,
        });
        let notification_id: Id = step
            .run("create-notification", || async move {
                let notification = notification::create(
                    db,
                    user_id,
                    NotificationType::MeetingReminder,
                    None,
                    metadata,
                )
                .await?;
                Ok::<_, Error>(notification.id)
            })
            .await?;

        let email_sent = match recipient.email.filter(|email| !email.trim().is_empty()) {
            Some(to_email) => {
                let email = MeetingReminderEmail {
                    to_email,
                    to_name: recipient
                        .name
                        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
                    meeting_title: meeting.title,
                    meeting_id,
                    scheduled_at: payload.scheduled_at,
                };
                step.run("send-email", || async move {
                    ctx.external("reminder email", ctx.mailer.send_meeting_reminder(email))
                        .await?;
                    Ok::<_, Error>(true)
                })
                .await?
            }
            None => {
                debug!("User {user_id} has no email address, reminder is in-app only");
                false
            }
        };

        info!(
            "Reminded user {user_id} of meeting {meeting_id} (notification {notification_id}, email sent: {email_sent})"
        );

        Ok(json!({
            "success": true,
            "notificationId": notification_id,
            "emailSent": email_sent,
        }))
    }
}

#[async_trait]
impl StepFunction for MeetingReminderSender {
    fn id(&self) -> &'static str {
        function_ids::MEETING_REMINDER
    }

    fn trigger(&self) -> &'static str {
        names::MEETING_REMINDER
    }

    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, events::Error> {
        let Event::MeetingReminder(payload) = event else {
            return Err(unexpected_event(self.id(), event));
        };

        self.remind(payload, step).await.map_err(|err| {
            error!(
                "Failed to send reminder of meeting {} to user {}: {err}",
                payload.meeting_id, payload.user_id
            );
            err.into_function_error()
        })
    }
}
