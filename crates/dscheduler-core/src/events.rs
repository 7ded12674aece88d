//! Job lifecycle events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{JobIdentity, TriggerKey};

/// A step in the life of one firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    TriggerFired {
        trigger: TriggerKey,
        job: JobIdentity,
        fire_instance_id: Uuid,
        scheduled_fire_time: DateTime<Utc>,
    },
    /// Claimed later than the misfire threshold. Fired once regardless.
    TriggerMisfired {
        trigger: TriggerKey,
        job: JobIdentity,
        scheduled_fire_time: DateTime<Utc>,
    },
    JobToBeExecuted {
        job: JobIdentity,
        fire_instance_id: Uuid,
    },
    JobExecuted {
        job: JobIdentity,
        fire_instance_id: Uuid,
        error: Option<String>,
        elapsed_ms: u64,
    },
    TriggerCompleted {
        trigger: TriggerKey,
        job: JobIdentity,
        fire_instance_id: Uuid,
    },
}

impl JobEvent {
    pub fn job(&self) -> &JobIdentity {
        match self {
            JobEvent::TriggerFired { job, .. }
            | JobEvent::TriggerMisfired { job, .. }
            | JobEvent::JobToBeExecuted { job, .. }
            | JobEvent::JobExecuted { job, .. }
            | JobEvent::TriggerCompleted { job, .. } => job,
        }
    }
}

/// Fan-out channel for [`JobEvent`]s.
///
/// Slow subscribers lag and lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Dropped silently when nobody listens.
    pub fn emit(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executed(error: Option<&str>) -> JobEvent {
        JobEvent::JobExecuted {
            job: JobIdentity::new("report", "g1"),
            fire_instance_id: Uuid::nil(),
            error: error.map(str::to_string),
            elapsed_ms: 12,
        }
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(executed(None));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job(), &JobIdentity::new("report", "g1"));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.receiver_count(), 0);
        bus.emit(executed(Some("boom")));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(executed(Some("boom"))).unwrap();
        assert_eq!(json["type"], "job_executed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["job"]["group"], "g1");
    }
}
