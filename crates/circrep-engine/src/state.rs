//! Per-job state and its lifecycle.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use circrep_core::CircuitRow;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type JobId = Uuid;

/// Pending log messages kept per job; the oldest are dropped past this.
pub const MAX_PENDING_LOGS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// `Created → Running → {Completed, Failed, Canceled}`, plus
    /// `Created → {Failed, Canceled}`. Terminal states accept nothing.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Created => matches!(next, Self::Running | Self::Failed | Self::Canceled),
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Canceled => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitOutcome {
    pub row_number: usize,
    pub node_id: String,
    pub interface_id: String,
    pub node_name: String,
    pub csv_success: bool,
    pub pdf_success: bool,
    pub error: Option<String>,
}

impl CircuitOutcome {
    #[must_use]
    pub fn for_row(row: &CircuitRow) -> Self {
        Self {
            row_number: row.row_number,
            node_id: row.node_id.clone(),
            interface_id: row.interface_id.clone(),
            node_name: row.node_name.clone(),
            csv_success: false,
            pdf_success: false,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct JobState {
    pub id: JobId,
    pub status: JobStatus,
    /// `None` until the spreadsheet has been read.
    pub total: Option<usize>,
    pub processed: usize,
    /// Sticky: the first error recorded is kept.
    pub error: Option<String>,
    pub cancel: CancellationToken,
    pub outcomes: Vec<CircuitOutcome>,
    pub work_dir: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    logs: VecDeque<String>,
}

impl JobState {
    #[must_use]
    pub fn new(id: JobId) -> Self {
        Self::new_at(id, Utc::now())
    }

    #[must_use]
    pub fn new_at(id: JobId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobStatus::Created,
            total: None,
            processed: 0,
            error: None,
            cancel: CancellationToken::new(),
            outcomes: Vec::new(),
            work_dir: None,
            archive_path: None,
            created_at,
            finished_at: None,
            logs: VecDeque::new(),
        }
    }

    /// Moves to `next` if the lifecycle allows it; entering a terminal status
    /// stamps `finished_at`. Returns whether the transition happened.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::debug!(
                job_id = %self.id,
                from = %self.status,
                to = %next,
                "ignoring invalid job transition"
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    /// Records `message` (unless an error is already set) and fails the job.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
        self.transition(JobStatus::Failed);
    }

    pub fn push_log(&mut self, message: impl Into<String>) {
        if self.logs.len() >= MAX_PENDING_LOGS {
            self.logs.pop_front();
        }
        self.logs.push_back(message.into());
    }

    /// Removes and returns every pending log message.
    pub fn drain_logs(&mut self) -> Vec<String> {
        self.logs.drain(..).collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            status: self.status,
            completed: self.status.is_terminal(),
            total: self
                .total
                .map_or(-1, |t| i64::try_from(t).unwrap_or(i64::MAX)),
            processed: self.processed,
            error: self.error.clone(),
            canceled: self.cancel.is_cancelled(),
            outcomes: self.outcomes.clone(),
            archive_ready: self.status == JobStatus::Completed && self.archive_path.is_some(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// Read-only copy of a job's state as exposed to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub completed: bool,
    /// `-1` until the spreadsheet has been read.
    pub total: i64,
    pub processed: usize,
    pub error: Option<String>,
    pub canceled: bool,
    pub outcomes: Vec<CircuitOutcome>,
    pub archive_ready: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
