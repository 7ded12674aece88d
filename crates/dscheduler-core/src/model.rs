//! Job and trigger data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Maximum job name length.
pub const MAX_NAME_LEN: usize = 200;
/// Maximum job group length.
pub const MAX_GROUP_LEN: usize = 200;
/// Maximum executable reference length.
pub const MAX_EXECUTABLE_LEN: usize = 255;
/// Maximum description length.
pub const MAX_DESCRIPTION_LEN: usize = 250;

/// Unique (name, group) key of a job. Case-sensitive.
///
/// The derived ordering compares name first, then group. Displays as
/// `<group>.<name>`, which is for logs only: dots are allowed in both
/// parts, so the text form does not identify a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobIdentity {
    pub name: String,
    pub group: String,
}

impl JobIdentity {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Unique (name, group) key of a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerKey {
    pub name: String,
    pub group: String,
}

impl TriggerKey {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
        }
    }

    /// The key of the single trigger created alongside a job.
    pub fn for_job(job: &JobIdentity) -> Self {
        Self::new(format!("{}_trigger", job.name), job.group.clone())
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// Live state of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
    Normal,
    Paused,
    Complete,
    Error,
    Blocked,
    /// The job has no trigger attached.
    NoTrigger,
}

impl TriggerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerState::Normal => "NORMAL",
            TriggerState::Paused => "PAUSED",
            TriggerState::Complete => "COMPLETE",
            TriggerState::Error => "ERROR",
            TriggerState::Blocked => "BLOCKED",
            TriggerState::NoTrigger => "NO_TRIGGER",
        }
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable job definition owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub identity: JobIdentity,
    /// Registry key of the executable.
    pub executable: String,
    pub description: Option<String>,
    /// May exist without an active trigger.
    pub durable: bool,
}

/// Cron trigger submitted together with a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub key: TriggerKey,
    pub job: JobIdentity,
    pub cron_expression: String,
    pub description: Option<String>,
}

/// Trigger metadata as reported by the store at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    pub key: TriggerKey,
    pub job: JobIdentity,
    pub state: TriggerState,
    pub cron_expression: Option<String>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
}

/// Operator input for scheduling a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub group: String,
    pub executable: String,
    pub cron_expression: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        executable: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            executable: executable.into(),
            cron_expression: cron_expression.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn identity(&self) -> JobIdentity {
        JobIdentity::new(self.name.clone(), self.group.clone())
    }

    /// Check field presence and length limits.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        check_field("name", &self.name, MAX_NAME_LEN)?;
        check_field("group", &self.group, MAX_GROUP_LEN)?;
        check_field("executable", &self.executable, MAX_EXECUTABLE_LEN)?;
        if self.cron_expression.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "cron expression cannot be blank".to_string(),
            ));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(SchedulerError::Validation(format!(
                    "description must be less than {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        Ok(())
    }

    /// Build the durable definition and its single cron trigger.
    pub fn into_parts(self) -> (JobDefinition, TriggerSpec) {
        let identity = self.identity();
        let trigger = TriggerSpec {
            key: TriggerKey::for_job(&identity),
            job: identity.clone(),
            cron_expression: self.cron_expression,
            description: self.description.clone(),
        };
        let definition = JobDefinition {
            identity,
            executable: self.executable,
            description: self.description,
            durable: true,
        };
        (definition, trigger)
    }
}

fn check_field(field: &str, value: &str, max: usize) -> Result<(), SchedulerError> {
    if value.trim().is_empty() {
        return Err(SchedulerError::Validation(format!(
            "job {} cannot be blank",
            field
        )));
    }
    if value.chars().count() > max {
        return Err(SchedulerError::Validation(format!(
            "job {} must be less than {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Presentation-ready view of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_name: String,
    pub job_group: String,
    pub executable: String,
    pub description: Option<String>,
    pub cron_expression: Option<String>,
    pub trigger_state: TriggerState,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Combine a definition with its first trigger, if any.
    ///
    /// `state` overrides the snapshot's state when a fresher value is known.
    pub fn assemble(
        definition: &JobDefinition,
        trigger: Option<&TriggerSnapshot>,
        state: Option<TriggerState>,
    ) -> Self {
        let identity = &definition.identity;
        let mut record = Self {
            job_name: identity.name.clone(),
            job_group: identity.group.clone(),
            executable: definition.executable.clone(),
            description: definition.description.clone(),
            cron_expression: None,
            trigger_state: TriggerState::NoTrigger,
            previous_fire_time: None,
            next_fire_time: None,
        };
        if let Some(trigger) = trigger {
            record.cron_expression = trigger.cron_expression.clone();
            record.trigger_state = state.unwrap_or(trigger.state);
            record.previous_fire_time = trigger.previous_fire_time;
            record.next_fire_time = trigger.next_fire_time;
        }
        record
    }

    pub fn identity(&self) -> JobIdentity {
        JobIdentity::new(self.job_name.clone(), self.job_group.clone())
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
