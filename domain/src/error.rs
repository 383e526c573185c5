//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. The intent is to translate errors between layers while maintaining
/// layer boundaries. Ex. `domain` is dependent on `entity_api` and `meeting-ai`, and the
/// worker binary is dependent on `domain`, but the worker should not be dependent, directly,
/// on `entity_api`. Ultimately the various `error_kind`s decide whether the job bus
/// attempts a failed run again (see [`Error::is_retryable`]).
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}
/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Config,
    // Failures of the job bus itself (checkpoint store, queue, event encoding)
    EventBus { retryable: bool },
    Other(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    InvalidTransition,
    DbTransaction,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    // The call did not finish within the configured bound
    Timeout,
    // The provider refused the request; repeating it will not help
    Rejected(String),
    Other(String),
}

impl Error {
    /// Whether the job bus should attempt the failed run again.
    ///
    /// Transient provider and database failures are retryable. Missing records,
    /// refused requests, invalid status moves and configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        match &self.error_kind {
            DomainErrorKind::External(ExternalErrorKind::Rejected(_)) => false,
            DomainErrorKind::External(_) => true,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::DbTransaction)) => {
                true
            }
            DomainErrorKind::Internal(InternalErrorKind::EventBus { retryable }) => *retryable,
            DomainErrorKind::Internal(_) => false,
        }
    }

    /// Copies this error's classification onto a new error wrapping `self`
    /// inside an `events::Error`, for returning from a step-function.
    pub fn into_function_error(self) -> events::Error {
        let retryable = self.is_retryable();
        events::Error::function(self, retryable)
    }

    /// The same error, made final: the bus must not attempt the run again.
    pub fn non_retryable(self) -> events::Error {
        events::Error::function(self, false)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Domain Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Domain Error: {:?}", self.error_kind),
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

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::InvalidQueryTerm => EntityErrorKind::Invalid,
            EntityApiErrorKind::InvalidStatusTransition => EntityErrorKind::InvalidTransition,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            EntityApiErrorKind::RecordNotUpdated => {
                EntityErrorKind::Other("Record not updated".to_string())
            }
            EntityApiErrorKind::Other => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        EntityApiError::from(err).into()
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        } else if err.is_timeout() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Timeout),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

impl From<meeting_ai::Error> for Error {
    fn from(err: meeting_ai::Error) -> Self {
        let error_kind = match &err {
            meeting_ai::Error::Network(_) => DomainErrorKind::External(ExternalErrorKind::Network),
            meeting_ai::Error::Timeout(_) => DomainErrorKind::External(ExternalErrorKind::Timeout),
            meeting_ai::Error::Authentication(_) | meeting_ai::Error::Configuration(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Config)
            }
            meeting_ai::Error::NotFound(msg) => {
                DomainErrorKind::External(ExternalErrorKind::Rejected(msg.clone()))
            }
            meeting_ai::Error::Serialization(msg) | meeting_ai::Error::Deserialization(msg) => {
                DomainErrorKind::External(ExternalErrorKind::Other(msg.clone()))
            }
            _ => DomainErrorKind::External(ExternalErrorKind::Other(err.to_string())),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<events::Error> for Error {
    fn from(err: events::Error) -> Self {
        let retryable = err.is_retryable();
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::EventBus { retryable }),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "JSON (de)serialization failed".to_string(),
            )),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Timeout),
        }
    }
}
