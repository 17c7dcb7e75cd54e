//! The job table.
//!
//! Every read and write of job state goes through [`JobStore`]. Closures
//! passed to [`JobStore::update`] run under the lock, so they must stay short
//! and must not block on I/O.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::mutex_ext::MutexExt;
use crate::state::{JobId, JobSnapshot, JobState, JobStatus};

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, JobState>>,
}

impl JobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: JobState) {
        self.jobs.lock_or_recover().insert(state.id, state);
    }

    #[must_use]
    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.lock_or_recover().contains_key(&id)
    }

    #[must_use]
    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        self.jobs.lock_or_recover().get(&id).map(JobState::snapshot)
    }

    /// Applies `f` to the job atomically. Returns `None` for unknown ids.
    pub fn update<R>(&self, id: JobId, f: impl FnOnce(&mut JobState) -> R) -> Option<R> {
        self.jobs.lock_or_recover().get_mut(&id).map(f)
    }

    /// Pending log messages, each returned at most once.
    pub fn drain_logs(&self, id: JobId) -> Option<Vec<String>> {
        self.update(id, JobState::drain_logs)
    }

    /// Signals cancellation and returns the job's current status. Finished
    /// jobs keep their status.
    pub fn cancel(&self, id: JobId) -> Option<JobStatus> {
        self.update(id, |job| {
            job.cancel.cancel();
            job.status
        })
    }

    pub fn remove(&self, id: JobId) -> Option<JobState> {
        self.jobs.lock_or_recover().remove(&id)
    }

    /// Removes and returns every job matching `predicate`.
    pub fn remove_where(&self, mut predicate: impl FnMut(&JobState) -> bool) -> Vec<JobState> {
        let mut jobs = self.jobs.lock_or_recover();
        let ids: Vec<JobId> = jobs
            .values()
            .filter(|job| predicate(job))
            .map(|job| job.id)
            .collect();
        ids.iter().filter_map(|id| jobs.remove(id)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock_or_recover().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
