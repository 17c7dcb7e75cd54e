//! Background report jobs: per-circuit fetch, reconcile and export, shared
//! job state, cancellation, archiving and the retention sweep.

pub mod archive;
pub mod controller;
pub mod error;
pub(crate) mod mutex_ext;
pub mod state;
pub mod store;
pub mod sweep;

pub use archive::{archive_directory, archive_file_name, download_name};
pub use controller::{default_exporters, EngineConfig, JobEngine};
pub use error::{ArchiveError, EngineError};
pub use state::{CircuitOutcome, JobId, JobSnapshot, JobState, JobStatus};
pub use store::JobStore;
pub use sweep::{sweep_expired, SweepSummary};
