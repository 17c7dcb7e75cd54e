//! Report artifact writers.

mod csv;
mod pdf;

use std::path::Path;

pub use self::csv::CsvExporter;
pub use self::pdf::PdfExporter;

use crate::error::ExportError;
use crate::report::CircuitReport;

/// Column headers shared by every artifact.
pub const COLUMN_HEADERS: [&str; 6] = [
    "รหัสหน่วยงาน",
    "ชื่อหน่วยงาน",
    "วันที่และเวลา",
    "ขนาดBandwidth (หน่วย Mbps)",
    "In_Averagebps",
    "Out_Averagebps",
];

/// Writes one circuit report to a file.
pub trait ReportExporter: Send + Sync {
    /// File extension, without the dot.
    fn extension(&self) -> &'static str;

    /// Top-level folder in the job archive (e.g. `CSV`).
    fn folder(&self) -> &'static str;

    /// Writes `report` to `path`, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if the file cannot be written or rendered.
    fn export(&self, report: &CircuitReport, path: &Path) -> Result<(), ExportError>;
}
