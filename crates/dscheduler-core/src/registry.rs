//! Executable registry.
//!
//! Jobs reference their executable by a string key. The registry maps keys
//! to factories, one fresh instance per firing.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use uuid::Uuid;

use crate::error::SchedulerError;
use crate::model::{JobIdentity, TriggerKey};
use crate::sample::SampleJob;

/// Per-firing data handed to an executable.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job: JobIdentity,
    pub trigger: TriggerKey,
    pub fire_instance_id: Uuid,
    pub scheduled_fire_time: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
}

/// Failure reported by an executable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Execution failed: {0}")]
    Failed(String),
}

/// Work that runs when a job's trigger fires.
#[async_trait]
pub trait Executable: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ExecutionError>;
}

/// Builds a fresh executable instance.
pub type ExecutableFactory = Arc<dyn Fn() -> Arc<dyn Executable> + Send + Sync>;

/// A resolved registry entry.
#[derive(Clone)]
pub struct ExecutableHandle {
    key: String,
    factory: ExecutableFactory,
}

impl ExecutableHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn instantiate(&self) -> Arc<dyn Executable> {
        (self.factory)()
    }
}

impl fmt::Debug for ExecutableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Thread-safe map from executable key to factory.
pub struct ExecutableRegistry {
    factories: DashMap<String, ExecutableFactory>,
}

impl ExecutableRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Registry preloaded with the built-in executables.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.factories.insert(
            SampleJob::KEY.to_string(),
            Arc::new(|| Arc::new(SampleJob::default()) as Arc<dyn Executable>),
        );
        registry
    }

    /// Register a factory.
    ///
    /// Returns an error if the key is already registered.
    pub fn register(
        &self,
        key: impl Into<String>,
        factory: ExecutableFactory,
    ) -> Result<(), SchedulerError> {
        let key = key.into();
        match self.factories.entry(key) {
            Entry::Occupied(entry) => {
                Err(SchedulerError::AlreadyRegistered(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                entry.insert(factory);
                Ok(())
            }
        }
    }

    /// Register a type constructible through `Default`.
    pub fn register_default<E>(&self, key: impl Into<String>) -> Result<(), SchedulerError>
    where
        E: Executable + Default + 'static,
    {
        self.register(key, Arc::new(|| Arc::new(E::default()) as Arc<dyn Executable>))
    }

    pub fn unregister(&self, key: &str) -> Result<(), SchedulerError> {
        self.factories
            .remove(key)
            .ok_or_else(|| SchedulerError::ExecutableNotFound(key.to_string()))?;
        Ok(())
    }

    /// Resolve a key to its handle.
    pub fn resolve(&self, key: &str) -> Result<ExecutableHandle, SchedulerError> {
        self.factories
            .get(key)
            .map(|factory| ExecutableHandle {
                key: key.to_string(),
                factory: factory.value().clone(),
            })
            .ok_or_else(|| SchedulerError::ExecutableNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ExecutableRegistry {
    fn default() -> Self {
        Self::new()
    }
}
