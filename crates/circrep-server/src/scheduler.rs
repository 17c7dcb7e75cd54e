//! Background job scheduler.
//!
//! Owns the periodic retention sweep over the in-memory job table.

use std::sync::Arc;

use chrono::Utc;
use circrep_core::AppConfig;
use circrep_engine::{sweep_expired, JobStore};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down the sweep.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// sweep job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: Arc<JobStore>,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sweep_job(&scheduler, store, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the retention sweep, repeating every `sweep_interval`.
async fn register_sweep_job(
    scheduler: &JobScheduler,
    store: Arc<JobStore>,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let interval = config.sweep_interval();
    let retention = config.job_retention();

    let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            tracing::debug!("scheduler: starting retention sweep");
            let swept =
                tokio::task::spawn_blocking(move || sweep_expired(&store, retention, Utc::now()))
                    .await;
            match swept {
                Ok(summary) => tracing::debug!(
                    expired = summary.expired,
                    abandoned = summary.abandoned,
                    "scheduler: retention sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: retention sweep task failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(
        interval_secs = interval.as_secs(),
        retention_hours = config.job_retention_hours,
        "scheduler: registered retention sweep"
    );
    Ok(())
}
