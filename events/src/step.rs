//! Checkpointed steps.
//!
//! A step-function run is a sequence of named steps. The output of each step
//! that completes is persisted under `(run id, step key)`; when a run is
//! attempted again after a crash or a retryable failure, completed steps return
//! their persisted output instead of executing again.

use crate::error::Error;
use crate::Id;
use async_trait::async_trait;
use log::*;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Persistence for step checkpoints.
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Returns the persisted output of a completed step, if any.
    async fn load(&self, run_id: Id, step_key: &str) -> Result<Option<Value>, Error>;

    /// Persists the output of a completed step.
    async fn save(&self, run_id: Id, step_key: &str, output: Value) -> Result<(), Error>;
}

/// Step runner handed to a step-function for one run.
#[derive(Clone)]
pub struct Step {
    run_id: Id,
    scope: &'static str,
    store: Arc<dyn StepStore>,
}

impl Step {
    /// `scope` namespaces step ids so that two functions triggered by the same
    /// event never share checkpoints.
    pub fn new(run_id: Id, scope: &'static str, store: Arc<dyn StepStore>) -> Self {
        Self {
            run_id,
            scope,
            store,
        }
    }

    pub fn run_id(&self) -> Id {
        self.run_id
    }

    fn key(&self, step_id: &str) -> String {
        format!("{}:{}", self.scope, step_id)
    }

    /// Executes `f` unless `step_id` already completed for this run, in which
    /// case the checkpointed output is returned and `f` is never called.
    ///
    /// Errors from `f` are returned as-is and leave no checkpoint behind.
    pub async fn run<T, E, F, Fut>(&self, step_id: &str, f: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key(step_id);

        if let Some(cached) = self.store.load(self.run_id, &key).await? {
            debug!(
                "Step {key} of run {} already completed, using checkpoint",
                self.run_id
            );
            return Ok(serde_json::from_value(cached).map_err(Error::from)?);
        }

        trace!("Running step {key} of run {}", self.run_id);
        let output = f().await?;

        let value = serde_json::to_value(&output).map_err(Error::from)?;
        self.store.save(self.run_id, &key, value).await?;

        Ok(output)
    }
}
