//! Trigger runner.
//!
//! Periodically claims due triggers from the store and runs their
//! executables. A claimed trigger stays `BLOCKED` until its execution
//! finishes, so one job never runs twice concurrently.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use dscheduler_config::RunnerConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::coordinator::ConsistencyCoordinator;
use crate::error::StoreError;
use crate::events::{EventBus, JobEvent};
use crate::registry::{ExecutableRegistry, ExecutionContext};
use crate::service::JobService;
use crate::store::{DueTrigger, FireOutcome, JobStore};

pub struct JobRunner {
    store: Arc<dyn JobStore>,
    registry: Arc<ExecutableRegistry>,
    coordinator: Arc<ConsistencyCoordinator>,
    events: EventBus,
    check_interval: Duration,
    misfire_threshold: TimeDelta,
}

impl JobRunner {
    pub fn new(service: &JobService, events: EventBus) -> Self {
        Self {
            store: service.store().clone(),
            registry: service.registry().clone(),
            coordinator: service.coordinator().clone(),
            events,
            check_interval: Duration::from_secs(1),
            misfire_threshold: TimeDelta::seconds(60),
        }
    }

    pub fn from_config(service: &JobService, events: EventBus, config: &RunnerConfig) -> Self {
        Self::new(service, events)
            .with_check_interval(Duration::from_millis(config.check_interval_ms))
            .with_misfire_threshold(Duration::from_secs(config.misfire_threshold_secs))
    }

    /// Set the check interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_misfire_threshold(mut self, threshold: Duration) -> Self {
        self.misfire_threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Run until `cancel` changes.
    pub async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        info!(
            "Job runner started (check interval: {:?})",
            self.check_interval
        );

        let mut interval = time::interval(self.check_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.fire_due().await {
                        error!("Job runner check failed: {}", e);
                    }
                }
                _ = cancel.changed() => {
                    info!("Job runner shutting down");
                    break;
                }
            }
        }
    }

    /// Fire every trigger due now.
    pub async fn fire_due(&self) -> Result<Vec<JoinHandle<()>>, StoreError> {
        self.fire_due_at(Utc::now()).await
    }

    /// Fire every trigger due at `now`. Returns the spawned executions.
    pub async fn fire_due_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<JoinHandle<()>>, StoreError> {
        let due = self
            .store
            .acquire_due_triggers(now, self.misfire_threshold)
            .await?;
        if !due.is_empty() {
            debug!(count = due.len(), "Acquired due triggers");
        }

        let mut handles = Vec::with_capacity(due.len());
        for trigger in due {
            self.coordinator.invalidate_triggers(&trigger.job).await;
            if let Some(handle) = self.fire(trigger).await {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    async fn fire(&self, due: DueTrigger) -> Option<JoinHandle<()>> {
        let fire_instance_id = Uuid::new_v4();

        if due.misfired {
            warn!(
                trigger = %due.key,
                scheduled = %due.scheduled_fire_time,
                "Trigger misfired, firing once now"
            );
            self.events.emit(JobEvent::TriggerMisfired {
                trigger: due.key.clone(),
                job: due.job.clone(),
                scheduled_fire_time: due.scheduled_fire_time,
            });
        }
        self.events.emit(JobEvent::TriggerFired {
            trigger: due.key.clone(),
            job: due.job.clone(),
            fire_instance_id,
            scheduled_fire_time: due.scheduled_fire_time,
        });

        let definition = match self.store.job_definition(&due.job).await {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                debug!(job = %due.job, "Job deleted before it could run");
                return None;
            }
            Err(e) => {
                error!(job = %due.job, error = %e, "Failed to load fired job");
                self.release(&due, FireOutcome::Completed).await;
                return None;
            }
        };

        let handle = match self.registry.resolve(&definition.executable) {
            Ok(handle) => handle,
            Err(e) => {
                error!(job = %due.job, error = %e, "Cannot run job");
                self.release(&due, FireOutcome::ExecutableMissing).await;
                return None;
            }
        };
        let executable = handle.instantiate();

        self.events.emit(JobEvent::JobToBeExecuted {
            job: due.job.clone(),
            fire_instance_id,
        });

        let ctx = ExecutionContext {
            job: due.job.clone(),
            trigger: due.key.clone(),
            fire_instance_id,
            scheduled_fire_time: due.scheduled_fire_time,
            fired_at: due.fired_at,
        };
        let store = self.store.clone();
        let coordinator = self.coordinator.clone();
        let events = self.events.clone();

        Some(tokio::spawn(async move {
            let started = Instant::now();
            let result = executable.execute(&ctx).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            if let Err(e) = &result {
                warn!(job = %ctx.job, error = %e, "Job execution failed");
            }
            events.emit(JobEvent::JobExecuted {
                job: ctx.job.clone(),
                fire_instance_id,
                error: result.err().map(|e| e.to_string()),
                elapsed_ms,
            });

            if let Err(e) = store.release_trigger(&ctx.trigger, FireOutcome::Completed).await {
                error!(trigger = %ctx.trigger, error = %e, "Failed to release trigger");
            }
            coordinator.invalidate_triggers(&ctx.job).await;

            events.emit(JobEvent::TriggerCompleted {
                trigger: ctx.trigger,
                job: ctx.job,
                fire_instance_id,
            });
        }))
    }

    async fn release(&self, due: &DueTrigger, outcome: FireOutcome) {
        if let Err(e) = self.store.release_trigger(&due.key, outcome).await {
            error!(trigger = %due.key, error = %e, "Failed to release trigger");
        }
        self.coordinator.invalidate_triggers(&due.job).await;
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
