//! Job controller.
//!
//! [`JobEngine::submit`] registers a job and spawns a worker that reads the
//! spreadsheet, then processes circuits one at a time in row order:
//! fetch → reconcile → export. Per-circuit failures are recorded as outcomes
//! and never stop the batch. Only an unreadable spreadsheet, a working
//! directory problem or an archive failure fail the whole job.
//!
//! Cancellation is checked before each circuit. A fetch already in flight is
//! not interrupted, so a cancel takes effect within one circuit's fetch
//! timeout (times the configured retries).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use circrep_core::{AppConfig, CircuitRow};
use circrep_report::{
    read_circuit_sheet, reconcile, CircuitReport, CsvExporter, ExportError, PdfExporter,
    ReportExporter,
};
use circrep_telemetry::TelemetryFetcher;
use uuid::Uuid;

use crate::archive::{archive_directory, archive_file_name};
use crate::error::EngineError;
use crate::state::{CircuitOutcome, JobId, JobSnapshot, JobState, JobStatus};
use crate::store::JobStore;

/// Filesystem locations used by the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Parent of the per-job working directories.
    pub work_dir: PathBuf,
    /// Where finished archives are written.
    pub archive_dir: PathBuf,
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            archive_dir: config.archive_dir.clone(),
        }
    }
}

/// CSV plus PDF, the PDF using `font_path` when given.
#[must_use]
pub fn default_exporters(font_path: Option<&Path>) -> Vec<Arc<dyn ReportExporter>> {
    let pdf = font_path.map_or_else(PdfExporter::new, PdfExporter::with_font_file);
    vec![Arc::new(CsvExporter), Arc::new(pdf)]
}

pub struct JobEngine<F> {
    store: Arc<JobStore>,
    fetcher: Arc<F>,
    exporters: Arc<[Arc<dyn ReportExporter>]>,
    config: Arc<EngineConfig>,
    today: Option<NaiveDate>,
}

impl<F> Clone for JobEngine<F> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            exporters: Arc::clone(&self.exporters),
            config: Arc::clone(&self.config),
            today: self.today,
        }
    }
}

impl<F: TelemetryFetcher + 'static> JobEngine<F> {
    pub fn new(fetcher: F, config: EngineConfig, exporters: Vec<Arc<dyn ReportExporter>>) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            fetcher: Arc::new(fetcher),
            exporters: exporters.into(),
            config: Arc::new(config),
            today: None,
        }
    }

    /// Fixes the date used for the previous-month fallback period.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a job for the uploaded spreadsheet and starts it in the
    /// background. Returns immediately.
    pub fn submit(&self, bytes: Vec<u8>, file_name: impl Into<String>) -> JobId {
        let id = Uuid::new_v4();
        let file_name = file_name.into();
        self.store.insert(JobState::new(id));
        tracing::info!(job_id = %id, file_name = %file_name, bytes = bytes.len(), "report job submitted");
        self.note(id, format!("received '{file_name}', starting processing"));

        let engine = self.clone();
        tokio::spawn(async move { engine.supervise(id, bytes, file_name).await });
        id
    }

    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobSnapshot> {
        self.store.snapshot(id)
    }

    pub fn drain_logs(&self, id: JobId) -> Option<Vec<String>> {
        self.store.drain_logs(id)
    }

    /// Requests cancellation. Finished jobs keep their status.
    pub fn cancel(&self, id: JobId) -> Option<JobStatus> {
        let status = self.store.cancel(id)?;
        tracing::info!(job_id = %id, status = %status, "cancellation requested");
        if !status.is_terminal() {
            self.note(id, "cancellation requested");
        }
        Some(status)
    }

    /// Archive of a completed job.
    #[must_use]
    pub fn archive_path(&self, id: JobId) -> Option<PathBuf> {
        self.store
            .update(id, |job| {
                (job.status == JobStatus::Completed)
                    .then(|| job.archive_path.clone())
                    .flatten()
            })
            .flatten()
    }

    /// Polls until the job reaches a terminal status.
    pub async fn wait(&self, id: JobId) -> Option<JobSnapshot> {
        loop {
            let snapshot = self.store.snapshot(id)?;
            if snapshot.completed {
                return Some(snapshot);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Runs the worker as its own task so that a panic surfaces as a
    /// `JoinError` and can be recorded as a failure.
    async fn supervise(self, id: JobId, bytes: Vec<u8>, file_name: String) {
        let worker = self.clone();
        let joined = tokio::spawn(async move { worker.run(id, bytes, file_name).await }).await;

        let message = match joined {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) if e.is_panic() => {
                format!("background worker panicked: {}", panic_message(e.into_panic().as_ref()))
            }
            Err(e) => format!("background worker stopped: {e}"),
        };

        tracing::error!(job_id = %id, error = %message, "report job failed");
        self.store.update(id, |job| {
            job.push_log(message.clone());
            job.fail(message);
        });
    }

    async fn run(&self, id: JobId, bytes: Vec<u8>, file_name: String) -> Result<(), EngineError> {
        let cancel = self
            .store
            .update(id, |job| job.cancel.clone())
            .ok_or(EngineError::JobVanished(id))?;

        let sheet = tokio::task::spawn_blocking(move || read_circuit_sheet(&bytes, &file_name))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;
        let total = sheet.len();

        if cancel.is_cancelled() {
            self.finish_canceled(id);
            return Ok(());
        }

        std::fs::create_dir_all(&self.config.work_dir).map_err(|source| EngineError::WorkDir {
            path: self.config.work_dir.clone(),
            source,
        })?;
        let work = tempfile::Builder::new()
            .prefix(&format!("report_job_{id}_"))
            .tempdir_in(&self.config.work_dir)
            .map_err(|source| EngineError::WorkDir {
                path: self.config.work_dir.clone(),
                source,
            })?;

        self.store
            .update(id, |job| {
                job.total = Some(total);
                job.work_dir = Some(work.path().to_path_buf());
                job.transition(JobStatus::Running);
                job.push_log(format!("spreadsheet has {total} rows"));
            })
            .ok_or(EngineError::JobVanished(id))?;
        tracing::info!(job_id = %id, total, "report job running");

        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        for row in &sheet.rows {
            if cancel.is_cancelled() {
                self.finish_canceled(id);
                return Ok(());
            }
            let outcome = self.process_row(id, row, work.path(), today).await;
            self.store.update(id, |job| {
                job.processed += 1;
                job.outcomes.push(outcome);
            });
        }

        if cancel.is_cancelled() {
            self.finish_canceled(id);
            return Ok(());
        }

        if !work.path().is_dir() {
            return Err(EngineError::MissingWorkDir(work.path().to_path_buf()));
        }
        let source = work.path().to_path_buf();
        let dest = self
            .config
            .archive_dir
            .join(archive_file_name(id, &Local::now()));
        let archive = tokio::task::spawn_blocking(move || archive_directory(&source, &dest))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;

        let recorded = self.store.update(id, |job| {
            job.archive_path = Some(archive.clone());
            job.transition(JobStatus::Completed);
            job.push_log("report generation complete");
        });
        if recorded.is_none() {
            // Swept while archiving.
            let _ = std::fs::remove_file(&archive);
            return Err(EngineError::JobVanished(id));
        }
        tracing::info!(job_id = %id, archive = %archive.display(), "report job completed");
        Ok(())
    }

    async fn process_row(
        &self,
        id: JobId,
        row: &CircuitRow,
        root: &Path,
        today: NaiveDate,
    ) -> CircuitOutcome {
        let mut outcome = CircuitOutcome::for_row(row);

        if !row.is_complete() {
            let message = format!("row {}: NodeID or Interface ID is empty", row.row_number);
            tracing::warn!(
                job_id = %id,
                row = row.row_number,
                node_id = %row.node_id,
                interface_id = %row.interface_id,
                "skipping incomplete row"
            );
            self.note(id, format!("skipping {message}"));
            outcome.error = Some(message);
            return outcome;
        }

        self.note(
            id,
            format!(
                "processing NodeID {}, Interface ID {} (row {})",
                row.node_id, row.interface_id, row.row_number
            ),
        );

        let records = match self.fetcher.fetch(&row.node_id, &row.interface_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    node_id = %row.node_id,
                    interface_id = %row.interface_id,
                    error = %e,
                    "telemetry fetch failed"
                );
                let message = format!(
                    "failed to fetch telemetry for NodeID {}, Interface ID {}: {e}",
                    row.node_id, row.interface_id
                );
                self.note(id, message.clone());
                outcome.error = Some(message);
                return outcome;
            }
        };

        let exporters = Arc::clone(&self.exporters);
        let owned_row = row.clone();
        let root = root.to_path_buf();
        let exported = tokio::task::spawn_blocking(move || {
            let report = reconcile(&records, &owned_row, today);
            export_report(&exporters, &report, &owned_row, &root)
        })
        .await;

        let results = match exported {
            Ok(results) => results,
            Err(e) => {
                outcome.error = Some(format!("export task failed: {e}"));
                return outcome;
            }
        };

        let mut errors = Vec::new();
        for (extension, result) in results {
            match result {
                Ok(_) if extension == "csv" => outcome.csv_success = true,
                Ok(_) if extension == "pdf" => outcome.pdf_success = true,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        job_id = %id,
                        node_id = %row.node_id,
                        format = extension,
                        error = %e,
                        "export failed"
                    );
                    errors.push(format!("{extension}: {e}"));
                }
            }
        }
        if !errors.is_empty() {
            let message = format!("export failed for {}: {}", row.display_name(), errors.join("; "));
            self.note(id, message.clone());
            outcome.error = Some(message);
        }
        outcome
    }

    fn finish_canceled(&self, id: JobId) {
        self.store.update(id, |job| {
            job.transition(JobStatus::Canceled);
            job.push_log("job canceled by user");
        });
        tracing::info!(job_id = %id, "report job canceled");
    }

    fn note(&self, id: JobId, message: impl Into<String>) {
        self.store.update(id, |job| job.push_log(message));
    }
}

/// Writes `report` with every exporter to
/// `<root>/<folder>/<ministry>/<department>/<province>/<agency>/<stem>.<ext>`.
pub(crate) fn export_report(
    exporters: &[Arc<dyn ReportExporter>],
    report: &CircuitReport,
    row: &CircuitRow,
    root: &Path,
) -> Vec<(&'static str, Result<PathBuf, ExportError>)> {
    exporters
        .iter()
        .map(|exporter| {
            let mut dir = root.join(exporter.folder());
            dir.extend(row.folder_components());
            let path = dir.join(format!("{}.{}", row.file_stem(), exporter.extension()));
            let result = std::fs::create_dir_all(&dir)
                .map_err(|e| ExportError::io(&dir, e))
                .and_then(|()| exporter.export(report, &path))
                .map(|()| path);
            (exporter.extension(), result)
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
