//! Retention sweep for finished and abandoned jobs.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::JobState;
use crate::store::JobStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub expired: usize,
    pub abandoned: usize,
}

/// Removes jobs that finished more than `retention` ago, and jobs that never
/// finished within a quarter of `retention` from creation. Their archives
/// and working directories are deleted after the lock is released.
pub fn sweep_expired(store: &JobStore, retention: Duration, now: DateTime<Utc>) -> SweepSummary {
    let abandon_after = retention / 4;
    let age = |since: DateTime<Utc>| (now - since).to_std().unwrap_or(Duration::ZERO);

    let removed = store.remove_where(|job| match job.finished_at {
        Some(finished) if job.status.is_terminal() => age(finished) > retention,
        _ => age(job.created_at) > abandon_after,
    });

    let mut summary = SweepSummary::default();
    for job in removed {
        if job.status.is_terminal() {
            summary.expired += 1;
        } else {
            job.cancel.cancel();
            summary.abandoned += 1;
            tracing::warn!(
                job_id = %job.id,
                status = %job.status,
                "removing job that never finished"
            );
        }
        delete_artifacts(&job);
    }

    if summary.expired + summary.abandoned > 0 {
        tracing::info!(
            expired = summary.expired,
            abandoned = summary.abandoned,
            "retention sweep removed jobs"
        );
    }
    summary
}

fn delete_artifacts(job: &JobState) {
    if let Some(archive) = &job.archive_path {
        remove_file_logged(archive);
    }
    if let Some(dir) = &job.work_dir {
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::warn!(path = %dir.display(), error = %e, "failed to remove working directory");
            }
        }
    }
}

fn remove_file_logged(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove archive"),
    }
}
