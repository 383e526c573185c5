//! Error types for the job event bus.
use std::error::Error as StdError;
use std::fmt;

/// Errors raised while sending, dispatching or checkpointing events.
///
/// The `retryable` flag on `EventsErrorKind::Function` is how a step-function
/// tells the bus whether a failed run should be attempted again.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: EventsErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum EventsErrorKind {
    // Event payload or step output could not be (de)serialized
    Serialization,
    // The step store or queue backend failed
    Store,
    // No step-function is registered for the event name
    UnknownEvent(String),
    // A step-function returned an error
    Function { retryable: bool },
}

impl Error {
    /// Wraps a step-function failure.
    pub fn function<E>(err: E, retryable: bool) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: EventsErrorKind::Function { retryable },
        }
    }

    /// Wraps a failure of the persistence backend behind a bus or step store.
    pub fn store<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(err)),
            error_kind: EventsErrorKind::Store,
        }
    }

    /// Whether the bus should attempt the run again.
    pub fn is_retryable(&self) -> bool {
        match self.error_kind {
            EventsErrorKind::Store => true,
            EventsErrorKind::Function { retryable } => retryable,
            EventsErrorKind::Serialization | EventsErrorKind::UnknownEvent(_) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Events Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Events Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: EventsErrorKind::Serialization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn function_errors_carry_their_retry_decision() {
        assert!(Error::function(Boom, true).is_retryable());
        assert!(!Error::function(Boom, false).is_retryable());
    }

    #[test]
    fn store_errors_are_retryable_and_unknown_events_are_not() {
        assert!(Error::store(Boom).is_retryable());

        let unknown = Error {
            source: None,
            error_kind: EventsErrorKind::UnknownEvent("nope".to_string()),
        };
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn display_includes_the_source_message() {
        let err = Error::function(Boom, false);
        assert!(err.to_string().contains("boom"));
    }
}
