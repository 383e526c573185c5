//! The production job bus: events are rows in `job_events`, step checkpoints
//! are rows in `job_steps`, and a [`Worker`] polls the table.

use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity_api::{job_event, job_step};
use events::{Dispatcher, Event, EventSender, StepStore};
use log::*;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use service::config::Config;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Backoff before attempt `attempts + 1`: one second after the first failed
/// attempt, doubling each time, capped at a minute.
pub fn retry_delay(attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16) as i32;
    let delay = BASE_RETRY_DELAY.as_secs_f64() * 2_f64.powi(exponent);
    Duration::from_secs_f64(delay.min(MAX_RETRY_DELAY.as_secs_f64()))
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(60))
}

/// Enqueues events as pending `job_events` rows.
pub struct DatabaseEventBus {
    db: Arc<DatabaseConnection>,
}

impl DatabaseEventBus {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventSender for DatabaseEventBus {
    async fn send(&self, event: Event) -> Result<Id, events::Error> {
        let payload = event.payload()?;
        let job = job_event::create(self.db.as_ref(), event.name(), payload)
            .await
            .map_err(events::Error::store)?;

        debug!("Sent {} as run {}", event.name(), job.id);
        Ok(job.id)
    }
}

/// Step checkpoints stored in `job_steps`, keyed by the run's job event id.
pub struct DatabaseStepStore {
    db: Arc<DatabaseConnection>,
}

impl DatabaseStepStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StepStore for DatabaseStepStore {
    async fn load(&self, run_id: Id, step_key: &str) -> Result<Option<Value>, events::Error> {
        let step = job_step::find(self.db.as_ref(), run_id, step_key)
            .await
            .map_err(events::Error::store)?;
        Ok(step.map(|s| s.output))
    }

    async fn save(&self, run_id: Id, step_key: &str, output: Value) -> Result<(), events::Error> {
        job_step::create(self.db.as_ref(), run_id, step_key, output)
            .await
            .map_err(events::Error::store)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Sleep between polls of an empty queue
    pub poll_interval: Duration,
    /// Attempts a run gets before it is marked failed
    pub max_attempts: u32,
    /// How long a run may stay claimed before it is re-queued
    pub lease: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
            max_attempts: config.job_max_attempts.max(1),
            lease: Duration::from_secs(config.job_lease_secs),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_attempts: 5,
            lease: Duration::from_secs(900),
        }
    }
}

/// What happened to the run a worker picked up.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        run_id: Id,
        output: Value,
    },
    /// Failed with a retryable error; deliverable again at `run_after`
    Retrying {
        run_id: Id,
        attempts: u32,
        run_after: DateTime<Utc>,
    },
    Failed {
        run_id: Id,
        attempts: u32,
        error: String,
    },
}

/// Polls `job_events` and dispatches each claimed event.
pub struct Worker {
    db: Arc<DatabaseConnection>,
    dispatcher: Dispatcher,
    store: Arc<DatabaseStepStore>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(db: Arc<DatabaseConnection>, dispatcher: Dispatcher, settings: WorkerSettings) -> Self {
        Self {
            store: Arc::new(DatabaseStepStore::new(Arc::clone(&db))),
            db,
            dispatcher,
            settings,
        }
    }

    /// Claims and runs at most one due event. `None` means the queue had
    /// nothing due.
    pub async fn run_once(&self) -> Result<Option<RunOutcome>, Error> {
        let db = self.db.as_ref();
        let now = Utc::now();

        let stale_before = now - chrono_duration(self.settings.lease);
        let requeued = job_event::requeue_stale(db, stale_before.into()).await?;
        if requeued > 0 {
            info!("Re-queued {requeued} abandoned runs");
        }

        let Some(job) = job_event::claim_next(db, now.into()).await? else {
            return Ok(None);
        };
        let run_id = job.id;
        let attempts = u32::try_from(job.attempts).unwrap_or(u32::MAX);

        if attempts > self.settings.max_attempts {
            // Only reachable for runs abandoned mid-attempt over and over.
            let error = format!("Abandoned after {} attempts", attempts - 1);
            warn!("Run {run_id} ({}) {error}", job.name);
            job_event::fail(db, run_id, error.clone()).await?;
            return Ok(Some(RunOutcome::Failed {
                run_id,
                attempts: attempts - 1,
                error,
            }));
        }

        let event = match Event::from_parts(&job.name, job.payload) {
            Ok(event) => event,
            Err(err) => {
                error!("Run {run_id} has an unreadable {} event: {err}", job.name);
                let error = err.to_string();
                job_event::fail(db, run_id, error.clone()).await?;
                return Ok(Some(RunOutcome::Failed {
                    run_id,
                    attempts,
                    error,
                }));
            }
        };

        debug!("Running {} run {run_id}, attempt {attempts}", job.name);
        let store: Arc<dyn StepStore> = self.store.clone();
        let outcome = match self.dispatcher.dispatch(run_id, &event, store).await {
            Ok(output) => {
                job_event::complete(db, run_id, output.clone()).await?;
                info!("Completed {} run {run_id}", job.name);
                RunOutcome::Completed { run_id, output }
            }
            Err(err) if err.is_retryable() && attempts < self.settings.max_attempts => {
                let run_after = Utc::now() + chrono_duration(retry_delay(attempts));
                warn!(
                    "{} run {run_id} failed on attempt {attempts}, retrying at {run_after}: {err}",
                    job.name
                );
                job_event::reschedule(db, run_id, run_after.into(), err.to_string()).await?;
                RunOutcome::Retrying {
                    run_id,
                    attempts,
                    run_after,
                }
            }
            Err(err) => {
                error!(
                    "{} run {run_id} failed permanently after {attempts} attempts: {err}",
                    job.name
                );
                let error = err.to_string();
                job_event::fail(db, run_id, error.clone()).await?;
                RunOutcome::Failed {
                    run_id,
                    attempts,
                    error,
                }
            }
        };

        Ok(Some(outcome))
    }

    /// Runs events until `shutdown` resolves. A run in progress is finished
    /// before the worker stops.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Worker started (poll every {:?}, {} attempts per run)",
            self.settings.poll_interval, self.settings.max_attempts
        );

        loop {
            let idle = match self.run_once().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(err) => {
                    error!("Failed to poll the job queue: {err}");
                    true
                }
            };

            let pause = if idle {
                self.settings.poll_interval
            } else {
                Duration::ZERO
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Worker stopped");
    }
}
