//! Adapters for the external services the job pipeline calls, and the traits
//! the step-functions see them through.
//!
//! Speech-to-text and LLM analysis are abstracted by `meeting_ai`; object
//! storage, billing and email are abstracted here.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::Id;
use log::*;
use secrecy::{ExposeSecret, SecretString};

pub mod assembly_ai;
pub mod mailersend;
pub mod open_ai;
pub mod stripe;
pub mod uploadthing;

/// Outcome of a batch file deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFilesResult {
    pub success: bool,
    pub deleted_count: usize,
}

/// Object storage holding recording media.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Deletes every file in one batch. `success == false` means the provider
    /// rejected the batch and no file should be assumed deleted.
    async fn delete_files(&self, file_urls: &[String]) -> Result<DeleteFilesResult, Error>;
}

/// Subscription state as reported by the billing provider.
///
/// `status` is the provider's raw status string (`active`, `canceled`,
/// `past_due`, ...). Period bounds are unix timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSubscription {
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

#[async_trait]
pub trait Billing: Send + Sync {
    async fn get_subscription(&self, subscription_id: &str) -> Result<BillingSubscription, Error>;
}

/// Everything a meeting reminder email needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingReminderEmail {
    pub to_email: String,
    pub to_name: String,
    pub meeting_title: String,
    pub meeting_id: Id,
    pub scheduled_at: DateTime<Utc>,
}

/// Transactional email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_meeting_reminder(&self, email: MeetingReminderEmail) -> Result<(), Error>;
}

/// Builds a sensitive header value from an API secret, optionally prefixed
/// (e.g. `"Bearer "`).
pub(crate) fn secret_header(
    prefix: &str,
    secret: &SecretString,
) -> Result<reqwest::header::HeaderValue, Error> {
    let value = format!("{prefix}{}", secret.expose_secret());
    let mut header = reqwest::header::HeaderValue::from_str(&value).map_err(|err| {
        warn!("Failed to create authorization header value: {err:?}");
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to create authorization header value".to_string(),
            )),
        }
    })?;
    header.set_sensitive(true);
    Ok(header)
}

/// Reads a required API key from config, failing with a config error when unset.
pub(crate) fn required_secret(name: &str, value: Option<String>) -> Result<SecretString, Error> {
    value.map(SecretString::new).ok_or_else(|| {
        warn!("Failed to get {name} from config");
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    })
}
