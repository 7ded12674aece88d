//! Demo job generation.

use dscheduler_config::SeedConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::model::{JobIdentity, JobSpec};
use crate::service::JobService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub created: usize,
    /// Already present, left untouched.
    pub skipped: usize,
    pub failed: usize,
}

/// Schedule `test<n>` jobs in every configured group.
///
/// Existing jobs are skipped and per-job failures are counted, not raised.
/// Only a failure to check existence aborts seeding.
pub async fn seed_demo_jobs(
    service: &JobService,
    config: &SeedConfig,
) -> Result<SeedReport, SchedulerError> {
    let mut report = SeedReport::default();

    for group in &config.groups {
        for i in 0..config.jobs_per_group {
            let name = format!("test{}", config.start_number + i);
            if service.job_exists(&JobIdentity::new(name.as_str(), group.as_str())).await? {
                report.skipped += 1;
                continue;
            }

            let spec = JobSpec::new(
                name.as_str(),
                group.as_str(),
                config.executable.as_str(),
                config.cron_expression.as_str(),
            )
            .with_description(format!("Demo job {} in {}", name, group));

            match service.schedule_job(spec).await {
                Ok(()) => report.created += 1,
                Err(e) => {
                    warn!(job = %name, group = %group, error = %e, "Failed to seed job");
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        created = report.created,
        skipped = report.skipped,
        failed = report.failed,
        "Demo jobs seeded"
    );
    Ok(report)
}
