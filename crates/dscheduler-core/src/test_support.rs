//! Instrumented store for unit tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::model::{
    JobDefinition, JobIdentity, JobSpec, TriggerKey, TriggerSnapshot, TriggerSpec, TriggerState,
};
use crate::store::{DueTrigger, FireOutcome, JobStore, MemoryJobStore};

pub(crate) const HOURLY: &str = "0 0 0/1 * * ?";

pub(crate) fn spec(name: &str, group: &str) -> JobSpec {
    JobSpec::new(name, group, "SampleJob", HOURLY)
}

/// Wraps a [`MemoryJobStore`], counting calls per operation and
/// optionally failing or slowing them down.
#[derive(Default)]
pub(crate) struct CountingStore {
    inner: MemoryJobStore,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing_ops: Mutex<HashSet<&'static str>>,
    failing_jobs: Mutex<HashSet<JobIdentity>>,
    load_delay: Mutex<Option<Duration>>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The wrapped store, for side-channel mutations that bypass counting.
    pub fn inner(&self) -> &MemoryJobStore {
        &self.inner
    }

    pub async fn add(&self, name: &str, group: &str) -> JobIdentity {
        let (definition, trigger) = spec(name, group).into_parts();
        let identity = definition.identity.clone();
        self.inner
            .submit_job_and_trigger(definition, trigger)
            .await
            .expect("seed job");
        identity
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_operation(&self, op: &'static str) {
        self.failing_ops.lock().insert(op);
    }

    /// Fail definition and trigger loads for one job.
    pub fn fail_job(&self, identity: JobIdentity) {
        self.failing_jobs.lock().insert(identity);
    }

    pub fn clear_failures(&self) {
        self.failing_ops.lock().clear();
        self.failing_jobs.lock().clear();
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = Some(delay);
    }

    fn record(&self, op: &'static str) -> Result<(), StoreError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.failing_ops.lock().contains(op) {
            return Err(StoreError::Unavailable(format!("{} failed", op)));
        }
        Ok(())
    }

    async fn record_load(
        &self,
        op: &'static str,
        identity: &JobIdentity,
    ) -> Result<(), StoreError> {
        self.record(op)?;
        let delay = *self.load_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_jobs.lock().contains(identity) {
            return Err(StoreError::Unavailable(format!("{} failed for {}", op, identity)));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for CountingStore {
    async fn list_job_identities(&self) -> Result<BTreeSet<JobIdentity>, StoreError> {
        self.record("list_job_identities")?;
        self.inner.list_job_identities().await
    }

    async fn job_exists(&self, identity: &JobIdentity) -> Result<bool, StoreError> {
        self.record("job_exists")?;
        self.inner.job_exists(identity).await
    }

    async fn job_definition(
        &self,
        identity: &JobIdentity,
    ) -> Result<Option<JobDefinition>, StoreError> {
        self.record_load("job_definition", identity).await?;
        self.inner.job_definition(identity).await
    }

    async fn triggers_for_job(
        &self,
        identity: &JobIdentity,
    ) -> Result<Vec<TriggerSnapshot>, StoreError> {
        self.record_load("triggers_for_job", identity).await?;
        self.inner.triggers_for_job(identity).await
    }

    async fn trigger_state(&self, key: &TriggerKey) -> Result<TriggerState, StoreError> {
        self.record("trigger_state")?;
        self.inner.trigger_state(key).await
    }

    async fn submit_job_and_trigger(
        &self,
        job: JobDefinition,
        trigger: TriggerSpec,
    ) -> Result<(), StoreError> {
        self.record("submit_job_and_trigger")?;
        self.inner.submit_job_and_trigger(job, trigger).await
    }

    async fn pause(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        self.record("pause")?;
        self.inner.pause(identity).await
    }

    async fn resume(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        self.record("resume")?;
        self.inner.resume(identity).await
    }

    async fn delete(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        self.record("delete")?;
        self.inner.delete(identity).await
    }

    async fn pause_group(&self, group: &str) -> Result<usize, StoreError> {
        self.record("pause_group")?;
        self.inner.pause_group(group).await
    }

    async fn resume_group(&self, group: &str) -> Result<usize, StoreError> {
        self.record("resume_group")?;
        self.inner.resume_group(group).await
    }

    async fn acquire_due_triggers(
        &self,
        now: DateTime<Utc>,
        misfire_threshold: TimeDelta,
    ) -> Result<Vec<DueTrigger>, StoreError> {
        self.record("acquire_due_triggers")?;
        self.inner.acquire_due_triggers(now, misfire_threshold).await
    }

    async fn release_trigger(
        &self,
        key: &TriggerKey,
        outcome: FireOutcome,
    ) -> Result<(), StoreError> {
        self.record("release_trigger")?;
        self.inner.release_trigger(key, outcome).await
    }
}
