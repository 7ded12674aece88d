//! Consistency coordinator.
//!
//! Decides per read pass whether cached job data may be trusted. The key
//! set is always read live from the store; when it differs from the last
//! observation the trigger cache is dropped in full and every entry of the
//! current pass is reloaded.
//!
//! Mutations are not transactional across the store and the caches. If the
//! process stops between a store write and the matching invalidation, the
//! stale entry survives until its TTL runs out or the next drift is
//! detected.

use std::collections::BTreeSet;
use std::sync::Arc;

use dscheduler_config::CacheConfig;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, EntryCache};
use crate::error::StoreError;
use crate::model::{JobDefinition, JobIdentity, JobRecord, TriggerSnapshot};
use crate::store::JobStore;
use crate::tracker::{KeySetDrift, KeySetTracker};

/// Cached view of one job: its definition and trigger list.
#[derive(Debug, Clone)]
pub struct JobEntry {
    pub definition: JobDefinition,
    pub triggers: Arc<Vec<TriggerSnapshot>>,
}

impl JobEntry {
    /// Only the first trigger is consulted; stores attach one per job.
    pub fn first_trigger(&self) -> Option<&TriggerSnapshot> {
        self.triggers.first()
    }
}

/// Outcome of reconciling the key set at the start of a read.
#[derive(Debug, Clone)]
pub struct ReadPass {
    pub keys: BTreeSet<JobIdentity>,
    pub drift: Option<KeySetDrift>,
}

impl ReadPass {
    /// Whether entries must bypass the cache for this pass.
    pub fn forced(&self) -> bool {
        self.drift.is_some()
    }
}

pub struct ConsistencyCoordinator {
    store: Arc<dyn JobStore>,
    tracker: KeySetTracker,
    job_cache: EntryCache<JobIdentity, JobDefinition>,
    trigger_cache: EntryCache<JobIdentity, Arc<Vec<TriggerSnapshot>>>,
    load_concurrency: usize,
}

impl ConsistencyCoordinator {
    pub fn new(store: Arc<dyn JobStore>, cache: &CacheConfig, load_concurrency: usize) -> Self {
        Self {
            store,
            tracker: KeySetTracker::new(),
            job_cache: EntryCache::from_config("job-definitions", cache),
            trigger_cache: EntryCache::from_config("job-triggers", cache),
            load_concurrency: load_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn tracker(&self) -> &KeySetTracker {
        &self.tracker
    }

    /// Read the live key set and apply drift invalidation.
    pub async fn reconcile(&self) -> Result<ReadPass, StoreError> {
        let keys = self.store.list_job_identities().await?;
        let drift = self.tracker.observe(&keys);

        if let Some(drift) = &drift {
            info!(
                added = drift.added.len(),
                removed = drift.removed.len(),
                total = keys.len(),
                "Job key set changed, reloading"
            );
            self.trigger_cache.invalidate_all();
            for identity in &drift.removed {
                self.job_cache.invalidate(identity).await;
            }
        }

        Ok(ReadPass { keys, drift })
    }

    /// Definition and triggers of one job. `Ok(None)` if the job is gone.
    pub async fn load_entry(
        &self,
        identity: &JobIdentity,
        force: bool,
    ) -> Result<Option<JobEntry>, StoreError> {
        let definition_loader = self.store.job_definition(identity);
        let definition = if force {
            self.job_cache.refresh(identity, definition_loader).await?
        } else {
            self.job_cache.get_or_load(identity, definition_loader).await?
        };
        let Some(definition) = definition else {
            return Ok(None);
        };

        let triggers_loader = async {
            self.store
                .triggers_for_job(identity)
                .await
                .map(|triggers| Some(Arc::new(triggers)))
        };
        let triggers = if force {
            self.trigger_cache.refresh(identity, triggers_loader).await?
        } else {
            self.trigger_cache.get_or_load(identity, triggers_loader).await?
        };

        Ok(Some(JobEntry {
            definition,
            triggers: triggers.unwrap_or_default(),
        }))
    }

    /// Presentation record of one job, with the trigger state read live.
    pub async fn load_record(
        &self,
        identity: &JobIdentity,
        force: bool,
    ) -> Result<Option<JobRecord>, StoreError> {
        let Some(entry) = self.load_entry(identity, force).await? else {
            return Ok(None);
        };
        let trigger = entry.first_trigger();
        let state = match trigger {
            Some(trigger) => Some(self.store.trigger_state(&trigger.key).await?),
            None => None,
        };
        Ok(Some(JobRecord::assemble(&entry.definition, trigger, state)))
    }

    /// Load records in input order. Identities that vanished or failed to
    /// load are left out.
    pub async fn load_records(&self, identities: Vec<JobIdentity>, force: bool) -> Vec<JobRecord> {
        let results: Vec<_> = stream::iter(identities)
            .map(|identity| async move {
                let result = self.load_record(&identity, force).await;
                (identity, result)
            })
            .buffered(self.load_concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(identity, result)| match result {
                Ok(Some(record)) => Some(record),
                Ok(None) => {
                    debug!(job = %identity, "Job disappeared during listing");
                    None
                }
                Err(e) => {
                    warn!(job = %identity, error = %e, "Dropping job from listing");
                    None
                }
            })
            .collect()
    }

    /// Drop both cache entries of one job.
    pub async fn invalidate(&self, identity: &JobIdentity) {
        self.job_cache.invalidate(identity).await;
        self.trigger_cache.invalidate(identity).await;
    }

    pub async fn invalidate_triggers(&self, identity: &JobIdentity) {
        self.trigger_cache.invalidate(identity).await;
    }

    pub fn invalidate_all_triggers(&self) {
        self.trigger_cache.invalidate_all();
    }

    /// Replace the tracked key set with the store's current one.
    pub async fn resync_tracker(&self) -> Result<(), StoreError> {
        let keys = self.store.list_job_identities().await?;
        debug!(total = keys.len(), "Resynchronized job key set");
        self.tracker.replace(keys);
        Ok(())
    }

    pub fn cache_stats(&self) -> [CacheStats; 2] {
        [self.job_cache.stats(), self.trigger_cache.stats()]
    }

    #[cfg(test)]
    pub(crate) async fn run_pending_tasks(&self) {
        self.job_cache.run_pending_tasks().await;
        self.trigger_cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
