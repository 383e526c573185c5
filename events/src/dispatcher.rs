use crate::error::{Error, EventsErrorKind};
use crate::event::Event;
use crate::step::{Step, StepStore};
use crate::Id;
use async_trait::async_trait;
use log::*;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A named unit of work triggered by one event type and composed of
/// checkpointed steps.
#[async_trait]
pub trait StepFunction: Send + Sync {
    /// Stable identifier, also used to namespace this function's checkpoints.
    fn id(&self) -> &'static str;

    /// Name of the event that triggers this function.
    fn trigger(&self) -> &'static str;

    /// Processes one delivery of the trigger event. Side effects must be
    /// wrapped in `step.run` so that a retried run does not repeat them.
    async fn handle(&self, event: &Event, step: &Step) -> Result<Value, Error>;
}

/// Routes events to their registered step-functions.
#[derive(Clone)]
pub struct Dispatcher {
    functions: Arc<Vec<Arc<dyn StepFunction>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            functions: Arc::new(Vec::new()),
        }
    }

    /// Register a new step-function.
    /// Note: This creates a new dispatcher instance with the additional function.
    pub fn with_function(mut self, function: Arc<dyn StepFunction>) -> Self {
        let mut functions = (*self.functions).clone();
        functions.push(function);
        self.functions = Arc::new(functions);
        self
    }

    /// Ids of the functions registered for an event name, in registration order.
    pub fn function_ids_for(&self, event_name: &str) -> Vec<&'static str> {
        self.functions
            .iter()
            .filter(|f| f.trigger() == event_name)
            .map(|f| f.id())
            .collect()
    }

    /// Runs every function registered for the event under the given run id.
    ///
    /// Returns an object keyed by function id holding each function's output.
    /// Functions run sequentially; the first error aborts the run so that the
    /// whole run is retried from its checkpoints.
    pub async fn dispatch(
        &self,
        run_id: Id,
        event: &Event,
        store: Arc<dyn StepStore>,
    ) -> Result<Value, Error> {
        let name = event.name();
        let mut outputs = Map::new();

        for function in self.functions.iter().filter(|f| f.trigger() == name) {
            debug!("Dispatching {name} run {run_id} to {}", function.id());

            let step = Step::new(run_id, function.id(), Arc::clone(&store));
            let output = function.handle(event, &step).await.map_err(|e| {
                warn!("Function {} failed for run {run_id}: {e}", function.id());
                e
            })?;

            outputs.insert(function.id().to_string(), output);
        }

        if outputs.is_empty() {
            warn!("No step-function registered for event {name} (run {run_id})");
            return Err(Error {
                source: None,
                error_kind: EventsErrorKind::UnknownEvent(name.to_string()),
            });
        }

        Ok(Value::Object(outputs))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
