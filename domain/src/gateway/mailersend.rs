use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use crate::gateway::{required_secret, secret_header, Mailer, MeetingReminderEmail};
use async_trait::async_trait;
use email_address::EmailAddress;
use log::*;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service::config::Config;

/// MailerSend API client for sending transactional emails
pub struct MailerSendClient {
    client: reqwest::Client,
    base_url: String,
    from_email: String,
    reminder_template_id: Option<String>,
    meeting_url: MeetingUrl,
}

/// Email recipient with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    pub name: Option<String>,
}

/// Email sender with name and email address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSender {
    pub email: String,
    pub name: Option<String>,
}

/// Template variables for one recipient
#[derive(Debug, Clone, Serialize)]
pub struct Personalization {
    pub email: String,
    pub data: Map<String, Value>,
}

/// Request payload for sending an email via MailerSend
#[derive(Debug, Serialize)]
pub struct SendEmailRequest {
    pub from: EmailSender,
    pub to: Vec<EmailRecipient>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub personalization: Vec<Personalization>,
}

/// Response from MailerSend API
#[derive(Debug, Deserialize)]
pub struct SendEmailResponse {
    pub message_id: Option<String>,
}

/// Builds links to a meeting page of the frontend.
#[derive(Debug, Clone)]
struct MeetingUrl {
    base_url: Option<String>,
    path_template: String,
}

impl MeetingUrl {
    fn for_meeting(&self, meeting_id: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| {
            format!(
                "{}{}",
                base.trim_end_matches('/'),
                self.path_template.replace("{meeting_id}", meeting_id)
            )
        })
    }
}

impl MailerSendClient {
    pub fn new(api_key: &SecretString, base_url: &str, from_email: &str) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            secret_header("Bearer ", api_key)?,
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            from_email: from_email.to_string(),
            reminder_template_id: None,
            meeting_url: MeetingUrl {
                base_url: None,
                path_template: "/meetings/{meeting_id}".to_string(),
            },
        })
    }

    /// Create a new MailerSend client with authentication, template and link settings from config
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let api_key = required_secret("MailerSend API key", config.mailersend_api_key())?;
        let mut client = Self::new(
            &api_key,
            config.mailersend_base_url(),
            config.reminder_from_email(),
        )?;
        client.reminder_template_id = config.meeting_reminder_email_template_id();
        client.meeting_url = MeetingUrl {
            base_url: config.frontend_base_url(),
            path_template: config.meeting_url_path().to_string(),
        };
        Ok(client)
    }

    pub fn with_reminder_template(mut self, template_id: &str) -> Self {
        self.reminder_template_id = Some(template_id.to_string());
        self
    }

    pub fn with_frontend_base_url(mut self, frontend_base_url: &str) -> Self {
        self.meeting_url.base_url = Some(frontend_base_url.to_string());
        self
    }

    /// Send an email using MailerSend API
    pub async fn send_email(&self, request: SendEmailRequest) -> Result<SendEmailResponse, Error> {
        // Validate email addresses before sending
        if !is_valid_email(&request.from.email) {
            warn!("Invalid sender email: {}", request.from.email);
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Invalid sender email address".to_string(),
                )),
            });
        }

        for recipient in &request.to {
            if !is_valid_email(&recipient.email) {
                warn!("Invalid recipient email: {}", recipient.email);
                return Err(Error {
                    source: None,
                    error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(format!(
                        "Invalid recipient email address: {}",
                        recipient.email
                    ))),
                });
            }
        }

        let url = format!("{}/email", self.base_url);

        info!("Sending email to {} recipients", request.to.len());
        debug!("Email subject: {}", request.subject);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to send email request: {e:?}");
                Error::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .headers()
                .get("x-message-id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            info!("Email sent successfully, message_id: {:?}", message_id);

            Ok(SendEmailResponse { message_id })
        } else {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Failed to send email: {} - {}", status, error_text);
            let error_kind = if status.is_client_error() && status.as_u16() != 429 {
                ExternalErrorKind::Rejected(error_text)
            } else {
                ExternalErrorKind::Network
            };
            Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(error_kind),
            })
        }
    }

    fn reminder_request(&self, email: &MeetingReminderEmail) -> SendEmailRequest {
        let meeting_id = email.meeting_id.to_string();
        let scheduled_at = email.scheduled_at.to_rfc3339();
        let subject = format!("Reminder: {}", email.meeting_title);

        let mut data = Map::new();
        data.insert("name".to_string(), Value::from(email.to_name.clone()));
        data.insert(
            "meeting_title".to_string(),
            Value::from(email.meeting_title.clone()),
        );
        data.insert("meeting_id".to_string(), Value::from(meeting_id.clone()));
        data.insert("scheduled_at".to_string(), Value::from(scheduled_at.clone()));
        if let Some(url) = self.meeting_url.for_meeting(&meeting_id) {
            data.insert("meeting_url".to_string(), Value::from(url));
        }

        // Without a template the reminder goes out as plain text.
        let text = match self.reminder_template_id {
            Some(_) => None,
            None => Some(format!(
                "Hi {}, your meeting \"{}\" starts at {scheduled_at}.",
                email.to_name, email.meeting_title
            )),
        };

        SendEmailRequest {
            from: EmailSender {
                email: self.from_email.clone(),
                name: Some("Shadow.AI".to_string()),
            },
            to: vec![EmailRecipient {
                email: email.to_email.clone(),
                name: Some(email.to_name.clone()),
            }],
            subject,
            text,
            template_id: self.reminder_template_id.clone(),
            personalization: vec![Personalization {
                email: email.to_email.clone(),
                data,
            }],
        }
    }
}

#[async_trait]
impl Mailer for MailerSendClient {
    async fn send_meeting_reminder(&self, email: MeetingReminderEmail) -> Result<(), Error> {
        info!(
            "Sending meeting reminder for meeting {} to {}",
            email.meeting_id, email.to_email
        );
        self.send_email(self.reminder_request(&email)).await?;
        Ok(())
    }
}

/// Validate email address format using email_address crate
pub fn is_valid_email(email: &str) -> bool {
    EmailAddress::is_valid(email)
}
