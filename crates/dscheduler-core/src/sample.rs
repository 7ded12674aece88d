//! Built-in demo executable.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::registry::{Executable, ExecutionContext, ExecutionError};

/// Logs its identity, then sleeps to simulate work.
#[derive(Debug, Clone)]
pub struct SampleJob {
    pause: Duration,
}

impl SampleJob {
    /// Registry key of the sample executable.
    pub const KEY: &'static str = "SampleJob";

    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }
}

impl Default for SampleJob {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Executable for SampleJob {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ExecutionError> {
        info!(
            "SampleJob (Name: {}, Group: {}) is executing",
            ctx.job.name, ctx.job.group
        );
        tokio::time::sleep(self.pause).await;
        info!(
            "SampleJob (Name: {}, Group: {}) finished",
            ctx.job.name, ctx.job.group
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobIdentity, TriggerKey};
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test(start_paused = true)]
    async fn test_sample_job_completes() {
        let job = JobIdentity::new("report", "g1");
        let ctx = ExecutionContext {
            trigger: TriggerKey::for_job(&job),
            job,
            fire_instance_id: Uuid::new_v4(),
            scheduled_fire_time: Utc::now(),
            fired_at: Utc::now(),
        };
        assert!(SampleJob::default().execute(&ctx).await.is_ok());
    }
}
