//! In-memory job store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::state::StoreState;
use super::{DueTrigger, FireOutcome, JobStore};
use crate::error::StoreError;
use crate::model::{
    JobDefinition, JobIdentity, TriggerKey, TriggerSnapshot, TriggerSpec, TriggerState,
};

/// Volatile job store, for tests and ephemeral runs.
pub struct MemoryJobStore {
    state: RwLock<StoreState>,
}

impl MemoryJobStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn list_job_identities(&self) -> Result<BTreeSet<JobIdentity>, StoreError> {
        Ok(self.state.read().await.identities())
    }

    async fn job_exists(&self, identity: &JobIdentity) -> Result<bool, StoreError> {
        Ok(self.state.read().await.contains(identity))
    }

    async fn job_definition(
        &self,
        identity: &JobIdentity,
    ) -> Result<Option<JobDefinition>, StoreError> {
        Ok(self.state.read().await.definition(identity))
    }

    async fn triggers_for_job(
        &self,
        identity: &JobIdentity,
    ) -> Result<Vec<TriggerSnapshot>, StoreError> {
        Ok(self.state.read().await.triggers(identity))
    }

    async fn trigger_state(&self, key: &TriggerKey) -> Result<TriggerState, StoreError> {
        self.state.read().await.trigger_state(key)
    }

    async fn submit_job_and_trigger(
        &self,
        job: JobDefinition,
        trigger: TriggerSpec,
    ) -> Result<(), StoreError> {
        let identity = job.identity.clone();
        let replaced = self.state.write().await.submit(job, trigger, Utc::now())?;
        debug!(job = %identity, replaced, "Stored job");
        Ok(())
    }

    async fn pause(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        self.state.write().await.pause(identity)
    }

    async fn resume(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        self.state.write().await.resume(identity, Utc::now())
    }

    async fn delete(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        self.state.write().await.remove(identity).map(|_| ())
    }

    async fn pause_group(&self, group: &str) -> Result<usize, StoreError> {
        Ok(self.state.write().await.pause_group(group).len())
    }

    async fn resume_group(&self, group: &str) -> Result<usize, StoreError> {
        Ok(self.state.write().await.resume_group(group, Utc::now()).len())
    }

    async fn acquire_due_triggers(
        &self,
        now: DateTime<Utc>,
        misfire_threshold: TimeDelta,
    ) -> Result<Vec<DueTrigger>, StoreError> {
        Ok(self.state.write().await.acquire(now, misfire_threshold))
    }

    async fn release_trigger(
        &self,
        key: &TriggerKey,
        outcome: FireOutcome,
    ) -> Result<(), StoreError> {
        self.state.write().await.release(key, outcome).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobSpec;

    #[tokio::test]
    async fn test_memory_job_store() {
        let store = MemoryJobStore::new();
        let (definition, trigger) =
            JobSpec::new("report", "g1", "SampleJob", "0 0 0/1 * * ?").into_parts();
        let id = definition.identity.clone();

        store.submit_job_and_trigger(definition, trigger).await.unwrap();
        assert!(store.job_exists(&id).await.unwrap());

        let loaded = store.job_definition(&id).await.unwrap();
        assert_eq!(loaded.unwrap().executable, "SampleJob");

        let all = store.list_job_identities().await.unwrap();
        assert_eq!(all.len(), 1);

        store.delete(&id).await.unwrap();
        assert!(store.job_definition(&id).await.unwrap().is_none());
        assert!(store.triggers_for_job(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_delete_missing_job() {
        let store = MemoryJobStore::new();
        let id = JobIdentity::new("ghost", "g1");
        assert_eq!(store.delete(&id).await, Err(StoreError::JobNotFound(id)));
    }
}
