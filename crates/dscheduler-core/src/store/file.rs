//! File system backed job store.
//!
//! One JSON document per job under `<root>/jobs`, written through on
//! every mutation and loaded once on open.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::state::{StoreState, StoredJob};
use super::{DueTrigger, FireOutcome, JobStore};
use crate::error::StoreError;
use crate::model::{
    JobDefinition, JobIdentity, TriggerKey, TriggerSnapshot, TriggerSpec, TriggerState,
};

/// Durable job store persisting each job as a JSON file.
pub struct FileJobStore {
    storage_path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileJobStore {
    /// Open the store, creating the directory and loading existing jobs.
    pub async fn open(storage_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let jobs_dir = storage_path.join("jobs");

        fs::create_dir_all(&jobs_dir).await.map_err(|e| {
            StoreError::Persistence(format!("Failed to create jobs directory: {}", e))
        })?;

        let jobs = Self::load_all(&jobs_dir).await?;
        info!("FileJobStore opened at {:?} with {} jobs", storage_path, jobs.len());

        Ok(Self {
            storage_path,
            state: RwLock::new(StoreState::from_jobs(jobs)),
        })
    }

    fn jobs_dir(&self) -> PathBuf {
        self.storage_path.join("jobs")
    }

    /// `<group>.<name>.json` with both parts encoded, so distinct
    /// identities never share a file.
    fn job_path(&self, identity: &JobIdentity) -> PathBuf {
        self.jobs_dir().join(format!(
            "{}.{}.json",
            Self::encode_component(&identity.group),
            Self::encode_component(&identity.name)
        ))
    }

    /// Lowercase ASCII letters, digits and `-` pass through; every other
    /// byte becomes `_xx`. The output never contains `.` and differs for
    /// names that differ only in case.
    fn encode_component(value: &str) -> String {
        let mut encoded = String::with_capacity(value.len());
        for byte in value.bytes() {
            if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
                encoded.push(char::from(byte));
            } else {
                encoded.push_str(&format!("_{:02x}", byte));
            }
        }
        encoded
    }

    async fn load_all(jobs_dir: &Path) -> Result<Vec<StoredJob>, StoreError> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(jobs_dir).await.map_err(|e| {
            StoreError::Persistence(format!("Failed to read jobs directory: {}", e))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StoreError::Persistence(format!("Failed to read directory entry: {}", e))
        })? {
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                match fs::read_to_string(&path).await {
                    Ok(content) => match serde_json::from_str::<StoredJob>(&content) {
                        Ok(job) => jobs.push(job),
                        Err(e) => {
                            warn!("Failed to deserialize job from {:?}: {}", path, e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read job file {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(jobs)
    }

    async fn persist(&self, state: &StoreState, identity: &JobIdentity) -> Result<(), StoreError> {
        let path = self.job_path(identity);
        match state.job(identity) {
            Some(job) => {
                let content = serde_json::to_string_pretty(job).map_err(|e| {
                    StoreError::Persistence(format!("Failed to serialize job: {}", e))
                })?;
                fs::write(&path, content).await.map_err(|e| {
                    StoreError::Persistence(format!("Failed to write job file: {}", e))
                })?;
                debug!("Saved job '{}' to {:?}", identity, path);
            }
            None => {
                if path.exists() {
                    fs::remove_file(&path).await.map_err(|e| {
                        StoreError::Persistence(format!("Failed to delete job file: {}", e))
                    })?;
                    debug!("Deleted job '{}' from {:?}", identity, path);
                }
            }
        }
        Ok(())
    }

    async fn persist_all(
        &self,
        state: &StoreState,
        identities: &[JobIdentity],
    ) -> Result<(), StoreError> {
        for identity in identities {
            self.persist(state, identity).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
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
        let mut state = self.state.write().await;
        state.submit(job, trigger, Utc::now())?;
        self.persist(&state, &identity).await
    }

    async fn pause(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.pause(identity)?;
        self.persist(&state, identity).await
    }

    async fn resume(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.resume(identity, Utc::now())?;
        self.persist(&state, identity).await
    }

    async fn delete(&self, identity: &JobIdentity) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.remove(identity)?;
        self.persist(&state, identity).await
    }

    async fn pause_group(&self, group: &str) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let affected = state.pause_group(group);
        self.persist_all(&state, &affected).await?;
        Ok(affected.len())
    }

    async fn resume_group(&self, group: &str) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let affected = state.resume_group(group, Utc::now());
        self.persist_all(&state, &affected).await?;
        Ok(affected.len())
    }

    async fn acquire_due_triggers(
        &self,
        now: DateTime<Utc>,
        misfire_threshold: TimeDelta,
    ) -> Result<Vec<DueTrigger>, StoreError> {
        let mut state = self.state.write().await;
        let due = state.acquire(now, misfire_threshold);
        let affected: Vec<JobIdentity> = due.iter().map(|d| d.job.clone()).collect();
        self.persist_all(&state, &affected).await?;
        Ok(due)
    }

    async fn release_trigger(
        &self,
        key: &TriggerKey,
        outcome: FireOutcome,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let owner = state.release(key, outcome)?;
        self.persist(&state, &owner).await
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
