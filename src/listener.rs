//! Lifecycle event logger.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dscheduler_core::{EventBus, JobEvent};

/// Log every job and trigger lifecycle event until the bus closes.
pub(crate) fn spawn_event_logger(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &JobEvent) {
    match event {
        JobEvent::TriggerFired { trigger, job, .. } => {
            info!("Trigger Listener: {} fired for job {}.", trigger, job);
        }
        JobEvent::TriggerMisfired { trigger, .. } => {
            warn!("Trigger Listener: {} misfired.", trigger);
        }
        JobEvent::JobToBeExecuted { job, .. } => {
            info!("Job Listener: {} is about to be executed.", job);
        }
        JobEvent::JobExecuted {
            job,
            error: Some(reason),
            ..
        } => {
            error!("Job Listener: {} execution failed: {}", job, reason);
        }
        JobEvent::JobExecuted {
            job, elapsed_ms, ..
        } => {
            info!(elapsed_ms, "Job Listener: {} was executed successfully.", job);
        }
        JobEvent::TriggerCompleted { trigger, job, .. } => {
            info!("Trigger Listener: {} completed for job {}.", trigger, job);
        }
    }
}

