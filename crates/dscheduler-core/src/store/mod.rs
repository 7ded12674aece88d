//! Authoritative job store interface and reference implementations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    JobDefinition, JobIdentity, TriggerKey, TriggerSnapshot, TriggerSpec, TriggerState,
};

mod file;
mod memory;
mod state;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

/// A trigger claimed for firing by [`JobStore::acquire_due_triggers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueTrigger {
    pub key: TriggerKey,
    pub job: JobIdentity,
    /// The fire time the schedule asked for.
    pub scheduled_fire_time: DateTime<Utc>,
    /// When the trigger was claimed.
    pub fired_at: DateTime<Utc>,
    /// Claimed later than the misfire threshold allows.
    pub misfired: bool,
}

/// How a claimed firing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireOutcome {
    /// The executable ran, successfully or not.
    Completed,
    /// The job's executable could not be resolved.
    ExecutableMissing,
}

/// The durable system of record for jobs and triggers.
///
/// Implementations must be safe for concurrent calls.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Current set of job identities. Always a live read.
    async fn list_job_identities(&self) -> Result<BTreeSet<JobIdentity>, StoreError>;

    async fn job_exists(&self, identity: &JobIdentity) -> Result<bool, StoreError>;

    /// `Ok(None)` when the job does not exist.
    async fn job_definition(
        &self,
        identity: &JobIdentity,
    ) -> Result<Option<JobDefinition>, StoreError>;

    /// Triggers attached to the job, in store order. Empty for unknown jobs.
    async fn triggers_for_job(
        &self,
        identity: &JobIdentity,
    ) -> Result<Vec<TriggerSnapshot>, StoreError>;

    async fn trigger_state(&self, key: &TriggerKey) -> Result<TriggerState, StoreError>;

    /// Store the job and its trigger atomically, replacing any job with the
    /// same identity together with its triggers.
    async fn submit_job_and_trigger(
        &self,
        job: JobDefinition,
        trigger: TriggerSpec,
    ) -> Result<(), StoreError>;

    async fn pause(&self, identity: &JobIdentity) -> Result<(), StoreError>;

    async fn resume(&self, identity: &JobIdentity) -> Result<(), StoreError>;

    /// Remove the job and all of its triggers.
    async fn delete(&self, identity: &JobIdentity) -> Result<(), StoreError>;

    /// Pause every trigger in the group. Returns the number of jobs affected.
    async fn pause_group(&self, group: &str) -> Result<usize, StoreError>;

    /// Resume every trigger in the group. Returns the number of jobs affected.
    async fn resume_group(&self, group: &str) -> Result<usize, StoreError>;

    /// Claim every trigger due at `now` and advance it past `now`.
    ///
    /// Claimed triggers stay `BLOCKED` until released.
    async fn acquire_due_triggers(
        &self,
        now: DateTime<Utc>,
        misfire_threshold: TimeDelta,
    ) -> Result<Vec<DueTrigger>, StoreError>;

    /// Finish a firing claimed by `acquire_due_triggers`.
    async fn release_trigger(
        &self,
        key: &TriggerKey,
        outcome: FireOutcome,
    ) -> Result<(), StoreError>;
}
