//! In-memory job table shared by the reference stores.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

use super::{DueTrigger, FireOutcome};
use crate::error::StoreError;
use crate::model::{
    JobDefinition, JobIdentity, TriggerKey, TriggerSnapshot, TriggerSpec, TriggerState,
};

pub(crate) fn parse_schedule(expression: &str) -> Result<Schedule, StoreError> {
    Schedule::from_str(expression).map_err(|e| StoreError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredTrigger {
    pub key: TriggerKey,
    pub cron_expression: String,
    pub description: Option<String>,
    pub state: TriggerState,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Claimed and not yet released. Independent of pause and resume.
    #[serde(default)]
    pub executing: bool,
}

impl StoredTrigger {
    fn from_spec(spec: TriggerSpec, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let schedule = parse_schedule(&spec.cron_expression)?;
        let next_fire_time = schedule.after(&now).next();
        Ok(Self {
            key: spec.key,
            cron_expression: spec.cron_expression,
            description: spec.description,
            state: runnable_state(next_fire_time),
            previous_fire_time: None,
            next_fire_time,
            executing: false,
        })
    }

    fn snapshot(&self, job: &JobIdentity) -> TriggerSnapshot {
        TriggerSnapshot {
            key: self.key.clone(),
            job: job.clone(),
            state: self.state,
            cron_expression: Some(self.cron_expression.clone()),
            previous_fire_time: self.previous_fire_time,
            next_fire_time: self.next_fire_time,
        }
    }

    fn pause(&mut self) {
        if self.state != TriggerState::Complete {
            self.state = TriggerState::Paused;
        }
    }

    /// Resumed triggers continue from `now`; missed fire times are skipped.
    fn resume(&mut self, now: DateTime<Utc>) {
        if !matches!(self.state, TriggerState::Paused | TriggerState::Error) {
            return;
        }
        match parse_schedule(&self.cron_expression) {
            Ok(schedule) => {
                self.next_fire_time = schedule.after(&now).next();
                self.state = self.settled_state();
            }
            Err(_) => self.state = TriggerState::Error,
        }
    }

    /// Returns the claimed fire time and whether it misfired.
    fn acquire(
        &mut self,
        now: DateTime<Utc>,
        threshold: TimeDelta,
    ) -> Option<(DateTime<Utc>, bool)> {
        if self.executing || self.state != TriggerState::Normal {
            return None;
        }
        let scheduled = self.next_fire_time.filter(|next| *next <= now)?;
        let schedule = match parse_schedule(&self.cron_expression) {
            Ok(schedule) => schedule,
            Err(_) => {
                self.state = TriggerState::Error;
                return None;
            }
        };

        self.previous_fire_time = Some(scheduled);
        self.next_fire_time = schedule.after(&now).next();
        self.executing = true;
        self.state = TriggerState::Blocked;
        Some((scheduled, now - scheduled > threshold))
    }

    fn release(&mut self, outcome: FireOutcome) {
        self.executing = false;
        match outcome {
            FireOutcome::Completed => {
                if self.state == TriggerState::Blocked {
                    self.state = runnable_state(self.next_fire_time);
                }
            }
            FireOutcome::ExecutableMissing => {
                if self.state != TriggerState::Paused {
                    self.state = TriggerState::Error;
                }
            }
        }
    }

    /// State of an unpaused trigger: `BLOCKED` while a firing is in flight.
    fn settled_state(&self) -> TriggerState {
        if self.executing {
            TriggerState::Blocked
        } else {
            runnable_state(self.next_fire_time)
        }
    }

    /// Carry an unreleased firing over from the trigger this one replaces.
    fn inherit_firing(&mut self, previous: &StoredTrigger) {
        if previous.key == self.key && previous.executing {
            self.executing = true;
            if self.state == TriggerState::Normal {
                self.state = TriggerState::Blocked;
            }
        }
    }

    /// Drop a firing left over from a previous process.
    fn abandon_firing(&mut self) {
        self.executing = false;
        if self.state == TriggerState::Blocked {
            self.state = runnable_state(self.next_fire_time);
        }
    }
}

fn runnable_state(next_fire_time: Option<DateTime<Utc>>) -> TriggerState {
    if next_fire_time.is_some() {
        TriggerState::Normal
    } else {
        TriggerState::Complete
    }
}

/// A job together with its triggers, the unit of persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredJob {
    pub definition: JobDefinition,
    pub triggers: Vec<StoredTrigger>,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    jobs: HashMap<JobIdentity, StoredJob>,
}

impl StoreState {
    /// Rebuild from persisted jobs. Firings that were in flight when the
    /// jobs were written are abandoned.
    pub fn from_jobs(jobs: impl IntoIterator<Item = StoredJob>) -> Self {
        Self {
            jobs: jobs
                .into_iter()
                .map(|mut job| {
                    job.triggers.iter_mut().for_each(StoredTrigger::abandon_firing);
                    (job.definition.identity.clone(), job)
                })
                .collect(),
        }
    }

    pub fn job(&self, identity: &JobIdentity) -> Option<&StoredJob> {
        self.jobs.get(identity)
    }

    pub fn identities(&self) -> BTreeSet<JobIdentity> {
        self.jobs.keys().cloned().collect()
    }

    pub fn contains(&self, identity: &JobIdentity) -> bool {
        self.jobs.contains_key(identity)
    }

    pub fn definition(&self, identity: &JobIdentity) -> Option<JobDefinition> {
        self.jobs.get(identity).map(|job| job.definition.clone())
    }

    pub fn triggers(&self, identity: &JobIdentity) -> Vec<TriggerSnapshot> {
        self.jobs
            .get(identity)
            .map(|job| job.triggers.iter().map(|t| t.snapshot(identity)).collect())
            .unwrap_or_default()
    }

    pub fn trigger_state(&self, key: &TriggerKey) -> Result<TriggerState, StoreError> {
        self.jobs
            .values()
            .filter(|job| job.definition.identity.group == key.group)
            .flat_map(|job| job.triggers.iter())
            .find(|trigger| &trigger.key == key)
            .map(|trigger| trigger.state)
            .ok_or_else(|| StoreError::TriggerNotFound(key.clone()))
    }

    /// Insert or replace a job. Returns true when a job was replaced.
    pub fn submit(
        &mut self,
        definition: JobDefinition,
        trigger: TriggerSpec,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if trigger.job != definition.identity {
            return Err(StoreError::JobNotFound(trigger.job));
        }
        let mut trigger = StoredTrigger::from_spec(trigger, now)?;
        let identity = definition.identity.clone();
        if let Some(previous) = self.jobs.get(&identity) {
            previous
                .triggers
                .iter()
                .for_each(|old| trigger.inherit_firing(old));
        }
        let replaced = self
            .jobs
            .insert(
                identity,
                StoredJob {
                    definition,
                    triggers: vec![trigger],
                },
            )
            .is_some();
        Ok(replaced)
    }

    pub fn pause(&mut self, identity: &JobIdentity) -> Result<(), StoreError> {
        let job = self.job_mut(identity)?;
        job.triggers.iter_mut().for_each(StoredTrigger::pause);
        Ok(())
    }

    pub fn resume(&mut self, identity: &JobIdentity, now: DateTime<Utc>) -> Result<(), StoreError> {
        let job = self.job_mut(identity)?;
        job.triggers.iter_mut().for_each(|t| t.resume(now));
        Ok(())
    }

    pub fn remove(&mut self, identity: &JobIdentity) -> Result<StoredJob, StoreError> {
        self.jobs
            .remove(identity)
            .ok_or_else(|| StoreError::JobNotFound(identity.clone()))
    }

    /// Returns the identities of the jobs in the group.
    pub fn pause_group(&mut self, group: &str) -> Vec<JobIdentity> {
        self.group_mut(group)
            .map(|job| {
                job.triggers.iter_mut().for_each(StoredTrigger::pause);
                job.definition.identity.clone()
            })
            .collect()
    }

    pub fn resume_group(&mut self, group: &str, now: DateTime<Utc>) -> Vec<JobIdentity> {
        self.group_mut(group)
            .map(|job| {
                job.triggers.iter_mut().for_each(|t| t.resume(now));
                job.definition.identity.clone()
            })
            .collect()
    }

    /// Claimed triggers come back ordered by scheduled fire time.
    pub fn acquire(&mut self, now: DateTime<Utc>, threshold: TimeDelta) -> Vec<DueTrigger> {
        let mut due = Vec::new();
        for job in self.jobs.values_mut() {
            for trigger in job.triggers.iter_mut() {
                if let Some((scheduled, misfired)) = trigger.acquire(now, threshold) {
                    due.push(DueTrigger {
                        key: trigger.key.clone(),
                        job: job.definition.identity.clone(),
                        scheduled_fire_time: scheduled,
                        fired_at: now,
                        misfired,
                    });
                }
            }
        }
        due.sort_by(|a, b| {
            a.scheduled_fire_time
                .cmp(&b.scheduled_fire_time)
                .then_with(|| a.key.cmp(&b.key))
        });
        due
    }

    /// Returns the owning job of the released trigger.
    pub fn release(
        &mut self,
        key: &TriggerKey,
        outcome: FireOutcome,
    ) -> Result<JobIdentity, StoreError> {
        let job = self
            .jobs
            .values_mut()
            .find(|job| job.triggers.iter().any(|t| &t.key == key))
            .ok_or_else(|| StoreError::TriggerNotFound(key.clone()))?;
        if let Some(trigger) = job.triggers.iter_mut().find(|t| &t.key == key) {
            trigger.release(outcome);
        }
        Ok(job.definition.identity.clone())
    }

    fn job_mut(&mut self, identity: &JobIdentity) -> Result<&mut StoredJob, StoreError> {
        self.jobs
            .get_mut(identity)
            .ok_or_else(|| StoreError::JobNotFound(identity.clone()))
    }

    fn group_mut<'a>(&'a mut self, group: &'a str) -> impl Iterator<Item = &'a mut StoredJob> + 'a {
        self.jobs
            .values_mut()
            .filter(move |job| job.definition.identity.group == group)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
