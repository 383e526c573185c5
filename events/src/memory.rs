//! In-memory bus and step store.
//!
//! Delivery is synchronous and deterministic: `send` only enqueues, and
//! `run_until_idle` dispatches queued events one at a time, including any
//! events sent by the functions it runs, until nothing is left.

use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::event::{Event, EventSender};
use crate::step::StepStore;
use crate::Id;
use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of one dispatched run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Id,
    pub event: Event,
    pub attempts: u32,
    pub result: Result<Value, Error>,
}

pub struct InMemoryEventBus {
    queue: Mutex<VecDeque<(Id, Event)>>,
    sent: Mutex<Vec<(Id, Event)>>,
    max_attempts: u32,
}

impl InMemoryEventBus {
    /// A bus that attempts each run once.
    pub fn new() -> Self {
        Self::with_max_attempts(1)
    }

    /// A bus that re-attempts runs failing with a retryable error, immediately
    /// and up to `max_attempts` attempts in total.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Every event sent so far, in send order.
    pub async fn sent(&self) -> Vec<Event> {
        self.sent.lock().await.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Events sent so far with the given name.
    pub async fn sent_named(&self, name: &str) -> Vec<Event> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(_, e)| e.name() == name)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Number of events waiting to be dispatched.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Queues an existing run again, as a redelivery of an event whose first
    /// attempt never finished. Checkpoints of the run are reused.
    pub async fn redeliver(&self, run_id: Id, event: Event) {
        self.queue.lock().await.push_back((run_id, event));
    }

    /// Dispatches queued events until the queue is empty.
    pub async fn run_until_idle(
        &self,
        dispatcher: &Dispatcher,
        store: Arc<dyn StepStore>,
    ) -> Vec<RunReport> {
        let mut reports = Vec::new();

        loop {
            // Release the queue lock before dispatching; functions send events.
            let next = self.queue.lock().await.pop_front();
            let Some((run_id, event)) = next else {
                break;
            };

            let mut attempts = 0;
            let result = loop {
                attempts += 1;
                match dispatcher
                    .dispatch(run_id, &event, Arc::clone(&store))
                    .await
                {
                    Err(e) if e.is_retryable() && attempts < self.max_attempts => {
                        debug!("Retrying run {run_id} after attempt {attempts}: {e}");
                    }
                    result => break result,
                }
            };

            reports.push(RunReport {
                run_id,
                event,
                attempts,
                result,
            });
        }

        reports
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSender for InMemoryEventBus {
    async fn send(&self, event: Event) -> Result<Id, Error> {
        let run_id = Id::new_v4();
        debug!("Queued {} as run {run_id}", event.name());

        self.sent.lock().await.push((run_id, event.clone()));
        self.queue.lock().await.push_back((run_id, event));
        Ok(run_id)
    }
}

/// Step checkpoints held in memory.
#[derive(Default)]
pub struct InMemoryStepStore {
    steps: Mutex<HashMap<(Id, String), Value>>,
}

impl InMemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of the steps completed for a run, sorted.
    pub async fn completed_steps(&self, run_id: Id) -> Vec<String> {
        let mut keys: Vec<String> = self
            .steps
            .lock()
            .await
            .keys()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StepStore for InMemoryStepStore {
    async fn load(&self, run_id: Id, step_key: &str) -> Result<Option<Value>, Error> {
        Ok(self
            .steps
            .lock()
            .await
            .get(&(run_id, step_key.to_string()))
            .cloned())
    }

    async fn save(&self, run_id: Id, step_key: &str, output: Value) -> Result<(), Error> {
        self.steps
            .lock()
            .await
            .insert((run_id, step_key.to_string()), output);
        Ok(())
    }
}
