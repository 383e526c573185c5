//! Dependencies shared by every step-function, built once at startup.

use crate::error::Error;
use crate::gateway::{Billing, Mailer, ObjectStorage};
use events::EventSender;
use log::*;
use meeting_ai::traits::{analysis, transcription};
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Tunables the step-functions read.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Language hint for speech-to-text, stored on every transcript
    pub transcript_language: String,
    /// Upper bound on any single external call
    pub external_call_timeout: Duration,
    /// Wait between status checks of a submitted transcription job
    pub transcription_poll_interval: Duration,
    /// Upper bound on how long a submitted transcription job may take
    pub transcription_timeout: Duration,
}

impl JobSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transcript_language: config.transcript_language.clone(),
            external_call_timeout: Duration::from_secs(config.external_call_timeout_secs),
            transcription_poll_interval: Duration::from_secs(
                config.transcription_poll_interval_secs,
            ),
            transcription_timeout: Duration::from_secs(config.transcription_timeout_secs),
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            transcript_language: "ru".to_string(),
            external_call_timeout: Duration::from_secs(120),
            transcription_poll_interval: Duration::from_secs(3),
            transcription_timeout: Duration::from_secs(3600),
        }
    }
}

#[derive(Clone)]
pub struct JobContext {
    pub db: Arc<DatabaseConnection>,
    pub transcription: Arc<dyn transcription::Provider>,
    pub analysis: Arc<dyn analysis::Provider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub billing: Arc<dyn Billing>,
    pub mailer: Arc<dyn Mailer>,
    pub events: Arc<dyn EventSender>,
    pub settings: JobSettings,
}

impl JobContext {
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Awaits a call to an external service, bounded by the configured timeout.
    /// A call that runs out of time fails with an external timeout error.
    pub async fn external<T, E, F>(&self, operation: &str, call: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, E>>,
        Error: From<E>,
    {
        match tokio::time::timeout(self.settings.external_call_timeout, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(elapsed) => {
                warn!(
                    "{operation} did not finish within {:?}",
                    self.settings.external_call_timeout
                );
                Err(elapsed.into())
            }
        }
    }
}
