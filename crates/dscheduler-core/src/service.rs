//! Job service: the operations exposed to the shell.
//!
//! Every mutation goes to the store first and invalidates the affected cache
//! entries afterwards.

use std::sync::Arc;

use dscheduler_config::{CacheConfig, QueryConfig};
use tracing::{info, warn};

use crate::coordinator::ConsistencyCoordinator;
use crate::error::SchedulerError;
use crate::model::{JobIdentity, JobRecord, JobSpec};
use crate::query::{JobQuery, Page, QueryAssembler};
use crate::registry::ExecutableRegistry;
use crate::store::JobStore;

pub struct JobService {
    store: Arc<dyn JobStore>,
    registry: Arc<ExecutableRegistry>,
    coordinator: Arc<ConsistencyCoordinator>,
    assembler: QueryAssembler,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<ExecutableRegistry>,
        cache: &CacheConfig,
        query: QueryConfig,
    ) -> Self {
        let coordinator = Arc::new(ConsistencyCoordinator::new(
            store.clone(),
            cache,
            query.load_concurrency,
        ));
        let assembler = QueryAssembler::new(coordinator.clone(), query);
        Self {
            store,
            registry,
            coordinator,
            assembler,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ExecutableRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<ConsistencyCoordinator> {
        &self.coordinator
    }

    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Page<JobRecord>, SchedulerError> {
        Ok(self.assembler.list_jobs(query).await?)
    }

    /// One job through the caches. `Ok(None)` when it does not exist.
    pub async fn get_job(
        &self,
        identity: &JobIdentity,
    ) -> Result<Option<JobRecord>, SchedulerError> {
        Ok(self.coordinator.load_record(identity, false).await?)
    }

    pub async fn job_exists(&self, identity: &JobIdentity) -> Result<bool, SchedulerError> {
        Ok(self.store.job_exists(identity).await?)
    }

    /// Create or overwrite a job with a single cron trigger.
    ///
    /// The executable must resolve before the store is touched.
    pub async fn schedule_job(&self, spec: JobSpec) -> Result<(), SchedulerError> {
        spec.validate()?;
        self.registry.resolve(&spec.executable)?;

        let identity = spec.identity();
        if self.store.job_exists(&identity).await? {
            warn!(job = %identity, "Job already exists, overwriting");
        }

        let cron = spec.cron_expression.clone();
        let (definition, trigger) = spec.into_parts();
        self.store.submit_job_and_trigger(definition, trigger).await?;
        self.coordinator.invalidate(&identity).await;
        info!(job = %identity, cron = %cron, "Job scheduled");

        // a failed resync leaves the tracker stale; the next read reports drift
        if let Err(e) = self.coordinator.resync_tracker().await {
            warn!(error = %e, "Failed to resynchronize job key set");
        }
        Ok(())
    }

    pub async fn pause_job(&self, identity: &JobIdentity) -> Result<(), SchedulerError> {
        self.store.pause(identity).await?;
        self.coordinator.invalidate(identity).await;
        info!(job = %identity, "Job paused");
        Ok(())
    }

    pub async fn resume_job(&self, identity: &JobIdentity) -> Result<(), SchedulerError> {
        self.store.resume(identity).await?;
        self.coordinator.invalidate(identity).await;
        info!(job = %identity, "Job resumed");
        Ok(())
    }

    pub async fn delete_job(&self, identity: &JobIdentity) -> Result<(), SchedulerError> {
        self.store.delete(identity).await?;
        self.coordinator.invalidate(identity).await;
        self.coordinator.tracker().remove(identity);
        info!(job = %identity, "Job deleted");
        Ok(())
    }

    /// Pause every job in the group. Returns the number of jobs affected.
    pub async fn pause_group(&self, group: &str) -> Result<usize, SchedulerError> {
        let affected = self.store.pause_group(group).await?;
        self.coordinator.invalidate_all_triggers();
        info!(group, affected, "Job group paused");
        Ok(affected)
    }

    pub async fn resume_group(&self, group: &str) -> Result<usize, SchedulerError> {
        let affected = self.store.resume_group(group).await?;
        self.coordinator.invalidate_all_triggers();
        info!(group, affected, "Job group resumed");
        Ok(affected)
    }

    /// For callers that changed the store through another channel.
    pub async fn invalidate_job_cache(
        &self,
        identity: &JobIdentity,
    ) -> Result<(), SchedulerError> {
        self.coordinator.invalidate(identity).await;
        self.coordinator.resync_tracker().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
