use std::path::PathBuf;

use circrep_report::SheetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive source directory not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Errors that abort a whole job.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error("failed to create working directory under {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("working directory disappeared before archiving: {}", .0.display())]
    MissingWorkDir(PathBuf),

    #[error("failed to build archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("job {0} is no longer tracked")]
    JobVanished(uuid::Uuid),

    #[error("background task failed: {0}")]
    Task(String),
}
