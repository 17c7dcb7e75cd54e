use thiserror::Error;

/// Errors raised while reading the uploaded circuit spreadsheet.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("spreadsheet is missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("spreadsheet is empty")]
    Empty,

    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("failed to read CSV sheet: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised while writing a report artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF rendering error: {0}")]
    Pdf(String),
}

impl ExportError {
    #[must_use]
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
