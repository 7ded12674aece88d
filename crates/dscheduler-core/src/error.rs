//! Error types.

use thiserror::Error;

use crate::model::{JobIdentity, TriggerKey};

/// Errors raised by an authoritative job store.
///
/// `Clone` so a single failed load can be handed to every caller that
/// coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No job with this identity.
    #[error("Job not found: {0}")]
    JobNotFound(JobIdentity),

    /// No trigger with this key.
    #[error("Trigger not found: {0}")]
    TriggerNotFound(TriggerKey),

    /// The cron expression was rejected by the store's grammar.
    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// Transient failure reaching the store.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Durable write or read failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Typed failure surfaced to callers of the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The executable reference does not resolve in the registry.
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// An executable is already registered under this key.
    #[error("Executable already registered: {0}")]
    AlreadyRegistered(String),

    /// Malformed cron/trigger spec, as reported by the store.
    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// The store could not be reached or failed to persist.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The mutation targets an identity absent from the store.
    #[error("Job not found: {0}")]
    NotFound(JobIdentity),

    /// The trigger vanished between listing and state lookup.
    #[error("Trigger not found: {0}")]
    TriggerNotFound(TriggerKey),

    /// Rejected before reaching the registry or the store.
    #[error("Invalid job: {0}")]
    Validation(String),
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::JobNotFound(identity) => SchedulerError::NotFound(identity),
            StoreError::TriggerNotFound(key) => SchedulerError::TriggerNotFound(key),
            StoreError::InvalidSchedule { expression, reason } => {
                SchedulerError::InvalidSchedule { expression, reason }
            }
            StoreError::Unavailable(msg) => SchedulerError::StoreUnavailable(msg),
            StoreError::Persistence(msg) => SchedulerError::StoreUnavailable(msg),
        }
    }
}
